use std::{sync::Arc, thread, time::Duration};

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use reqwest::blocking::Client;

use crate::types::Frame;

/// Reference picture for one pose of one question.
#[derive(Clone, Debug)]
pub struct PoseReference {
    pub question_no: u32,
    pub pose_no: u32,
    pub image: Frame,
}

pub trait PoseReferenceSource: Send + Sync + 'static {
    fn fetch(&self, question_no: u32, pose_no: u32) -> Result<Frame>;
}

pub struct HttpPoseReference {
    client: Client,
    endpoint: String,
}

impl HttpPoseReference {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .context("failed to build pose reference http client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl PoseReferenceSource for HttpPoseReference {
    fn fetch(&self, question_no: u32, pose_no: u32) -> Result<Frame> {
        let bytes = self
            .client
            .get(&self.endpoint)
            .query(&[("wordDes", question_no), ("wordNo", pose_no)])
            .send()
            .context("pose reference request failed")?
            .error_for_status()
            .context("pose reference request returned error status")?
            .bytes()
            .context("failed to read pose reference body")?;
        Frame::decode(&bytes)
    }
}

/// Fetches in the background; failures are logged and nothing is sent.
pub fn spawn_fetch(
    source: Arc<dyn PoseReferenceSource>,
    question_no: u32,
    pose_no: u32,
    tx: Sender<PoseReference>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || match source.fetch(question_no, pose_no) {
        Ok(image) => {
            let _ = tx.send(PoseReference {
                question_no,
                pose_no,
                image,
            });
        }
        Err(err) => {
            log::warn!("no reference image for question {question_no} pose {pose_no}: {err:#}");
        }
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crossbeam_channel::unbounded;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use mockito::Matcher;

    use super::*;

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(RgbaImage::new(4, 3))
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        bytes.into_inner()
    }

    #[test]
    fn fetches_reference_by_question_and_pose() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/poses")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("wordDes".into(), "3".into()),
                Matcher::UrlEncoded("wordNo".into(), "2".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(png_bytes())
            .create();

        let source =
            HttpPoseReference::new(format!("{}/poses", server.url()), Duration::from_secs(5))
                .unwrap();
        let (tx, rx) = unbounded();
        spawn_fetch(Arc::new(source), 3, 2, tx).join().unwrap();

        mock.assert();
        let reference = rx.try_recv().expect("reference sent");
        assert_eq!((reference.question_no, reference.pose_no), (3, 2));
        assert_eq!((reference.image.width, reference.image.height), (4, 3));
    }

    #[test]
    fn missing_reference_sends_nothing() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/poses")
            .match_query(Matcher::Any)
            .with_status(404)
            .create();

        let source =
            HttpPoseReference::new(format!("{}/poses", server.url()), Duration::from_secs(5))
                .unwrap();
        let (tx, rx) = unbounded();
        spawn_fetch(Arc::new(source), 1, 1, tx).join().unwrap();
        assert!(rx.try_recv().is_err());
    }
}
