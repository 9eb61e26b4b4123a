use std::time::Duration;

use anyhow::Context;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::blocking::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use thiserror::Error;

use crate::types::Frame;

const SNAPSHOT_FILE_NAME: &str = "capture.jpg";
const SNAPSHOT_MIME: &str = "image/jpeg";

/// One capture attempt for the pose `pose_no` of question `question_no`.
#[derive(Clone, Debug)]
pub struct Submission {
    pub image_jpeg: Vec<u8>,
    pub pose_no: u32,
    pub question_no: u32,
}

#[derive(Clone, Debug)]
pub struct Verdict {
    pub is_similar: bool,
    pub annotated_image: Option<Frame>,
}

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("evaluation request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("evaluation service answered with status {0}")]
    Status(u16),
    #[error("malformed evaluation response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("failed to prepare snapshot: {0}")]
    Snapshot(String),
}

pub trait AnswerEvaluator: Send + Sync + 'static {
    fn evaluate(&self, submission: &Submission) -> Result<Verdict, EvaluationError>;
}

#[derive(Deserialize)]
struct EvaluationResponse {
    #[serde(rename = "isSimilar")]
    is_similar: bool,
    #[serde(default)]
    image: Option<String>,
}

/// Multipart client for the remote similarity scorer.
pub struct HttpEvaluator {
    client: Client,
    endpoint: String,
}

impl HttpEvaluator {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        // The scorer keys sessions off cookies, so keep them across requests.
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .context("failed to build evaluation http client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl AnswerEvaluator for HttpEvaluator {
    fn evaluate(&self, submission: &Submission) -> Result<Verdict, EvaluationError> {
        let file = Part::bytes(submission.image_jpeg.clone())
            .file_name(SNAPSHOT_FILE_NAME)
            .mime_str(SNAPSHOT_MIME)?;
        let form = Form::new()
            .part("file", file)
            .text("wordNo", submission.pose_no.to_string())
            .text("wordDes", submission.question_no.to_string());

        log::debug!(
            "submitting pose {} of question {} ({} bytes) to {}",
            submission.pose_no,
            submission.question_no,
            submission.image_jpeg.len(),
            self.endpoint
        );

        let response = self.client.post(&self.endpoint).multipart(form).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(EvaluationError::Status(status.as_u16()));
        }

        let body = response.text()?;
        parse_verdict(&body)
    }
}

fn parse_verdict(body: &str) -> Result<Verdict, EvaluationError> {
    let response: EvaluationResponse = serde_json::from_str(body)?;

    let annotated_image = response
        .image
        .filter(|encoded| !encoded.trim().is_empty())
        .and_then(|encoded| match decode_annotated_image(&encoded) {
            Ok(frame) => Some(frame),
            Err(err) => {
                log::warn!("ignoring undecodable annotated image: {err:#}");
                None
            }
        });

    Ok(Verdict {
        is_similar: response.is_similar,
        annotated_image,
    })
}

fn decode_annotated_image(encoded: &str) -> anyhow::Result<Frame> {
    // Accept both bare base64 and a `data:image/png;base64,` URL.
    let payload = encoded
        .split_once("base64,")
        .map(|(_, data)| data)
        .unwrap_or(encoded)
        .trim();
    let bytes = STANDARD
        .decode(payload)
        .context("annotated image is not valid base64")?;
    Frame::decode(&bytes)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, RgbaImage};
    use mockito::Matcher;

    use super::*;

    fn png_base64(width: u32, height: u32) -> String {
        let image = RgbaImage::from_pixel(width, height, image::Rgba([0, 255, 0, 255]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        STANDARD.encode(bytes.into_inner())
    }

    fn submission() -> Submission {
        Submission {
            image_jpeg: b"fake-jpeg-bytes".to_vec(),
            pose_no: 2,
            question_no: 5,
        }
    }

    #[test]
    fn posts_multipart_fields_and_reads_verdict() {
        let mut server = mockito::Server::new();
        let body = format!(r#"{{"isSimilar": true, "image": "{}"}}"#, png_base64(3, 2));
        let mock = server
            .mock("POST", "/evaluate")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data; boundary=".to_string()),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="file"; filename="capture.jpg""#.to_string()),
                Matcher::Regex("fake-jpeg-bytes".to_string()),
                Matcher::Regex(r#"name="wordNo"\r\n\r\n2\r\n"#.to_string()),
                Matcher::Regex(r#"name="wordDes"\r\n\r\n5\r\n"#.to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create();

        let evaluator = HttpEvaluator::new(
            format!("{}/evaluate", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let verdict = evaluator.evaluate(&submission()).expect("verdict");

        mock.assert();
        assert!(verdict.is_similar);
        let annotated = verdict.annotated_image.expect("annotated image");
        assert_eq!((annotated.width, annotated.height), (3, 2));
    }

    #[test]
    fn server_error_is_reported_as_status() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/evaluate")
            .with_status(502)
            .create();

        let evaluator = HttpEvaluator::new(
            format!("{}/evaluate", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = evaluator.evaluate(&submission()).unwrap_err();
        assert!(matches!(err, EvaluationError::Status(502)), "{err:?}");
    }

    #[test]
    fn non_json_body_is_malformed() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/evaluate")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create();

        let evaluator = HttpEvaluator::new(
            format!("{}/evaluate", server.url()),
            Duration::from_secs(5),
        )
        .unwrap();
        let err = evaluator.evaluate(&submission()).unwrap_err();
        assert!(matches!(err, EvaluationError::Malformed(_)), "{err:?}");
    }

    #[test]
    fn unreachable_service_is_a_transport_error() {
        let evaluator =
            HttpEvaluator::new("http://127.0.0.1:9/evaluate", Duration::from_secs(2)).unwrap();
        let err = evaluator.evaluate(&submission()).unwrap_err();
        assert!(matches!(err, EvaluationError::Transport(_)), "{err:?}");
    }

    #[test]
    fn missing_image_is_not_an_error() {
        let verdict = parse_verdict(r#"{"isSimilar": false}"#).unwrap();
        assert!(!verdict.is_similar);
        assert!(verdict.annotated_image.is_none());

        let verdict = parse_verdict(r#"{"isSimilar": true, "image": null}"#).unwrap();
        assert!(verdict.annotated_image.is_none());
    }

    #[test]
    fn undecodable_image_is_downgraded_to_missing() {
        let verdict = parse_verdict(r#"{"isSimilar": true, "image": "%%%not-base64"}"#).unwrap();
        assert!(verdict.is_similar);
        assert!(verdict.annotated_image.is_none());
    }

    #[test]
    fn data_url_prefix_is_accepted() {
        let body = format!(
            r#"{{"isSimilar": true, "image": "data:image/png;base64,{}"}}"#,
            png_base64(1, 1)
        );
        let verdict = parse_verdict(&body).unwrap();
        assert!(verdict.annotated_image.is_some());
    }

    #[test]
    fn missing_verdict_field_is_malformed() {
        assert!(matches!(
            parse_verdict(r#"{"image": ""}"#),
            Err(EvaluationError::Malformed(_))
        ));
    }
}
