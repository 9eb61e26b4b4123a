/// Most notices shown at once; older ones fall off the top.
const MAX_VISIBLE_NOTICES: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum NoticeKind {
    Success,
    Info,
    Error,
}

#[derive(Clone, Debug)]
pub(super) struct Notice {
    pub(super) id: u64,
    pub(super) kind: NoticeKind,
    pub(super) message: String,
}

/// Dismissible messages above the camera box.
#[derive(Default)]
pub(super) struct NoticeBoard {
    notices: Vec<Notice>,
    next_id: u64,
}

impl NoticeBoard {
    pub(super) fn push(&mut self, kind: NoticeKind, message: impl Into<String>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.notices.push(Notice {
            id,
            kind,
            message: message.into(),
        });

        if self.notices.len() > MAX_VISIBLE_NOTICES {
            let overflow = self.notices.len() - MAX_VISIBLE_NOTICES;
            self.notices.drain(..overflow);
        }
        id
    }

    pub(super) fn dismiss(&mut self, id: u64) {
        self.notices.retain(|notice| notice.id != id);
    }

    /// Drops feedback about the previous attempt. Errors stay until dismissed.
    pub(super) fn clear_transient(&mut self) {
        self.notices.retain(|notice| notice.kind == NoticeKind::Error);
    }

    pub(super) fn clear(&mut self) {
        self.notices.clear();
    }

    pub(super) fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.notices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(board: &NoticeBoard) -> Vec<&str> {
        board.iter().map(|n| n.message.as_str()).collect()
    }

    #[test]
    fn board_keeps_only_newest_notices() {
        let mut board = NoticeBoard::default();
        for pose in 1..=6 {
            board.push(NoticeKind::Info, format!("missing image {pose}"));
            board.push(NoticeKind::Success, format!("correct {pose}"));
        }

        assert_eq!(board.len(), MAX_VISIBLE_NOTICES);
        assert_eq!(
            messages(&board),
            vec!["correct 5", "missing image 6", "correct 6"]
        );
    }

    #[test]
    fn clear_transient_keeps_errors() {
        let mut board = NoticeBoard::default();
        board.push(NoticeKind::Success, "correct");
        board.push(NoticeKind::Error, "scoring failed");
        board.push(NoticeKind::Info, "no image");

        board.clear_transient();
        assert_eq!(messages(&board), vec!["scoring failed"]);
    }

    #[test]
    fn dismiss_removes_by_id() {
        let mut board = NoticeBoard::default();
        let first = board.push(NoticeKind::Error, "first");
        let second = board.push(NoticeKind::Error, "second");
        assert_ne!(first, second);

        board.dismiss(first);
        assert_eq!(messages(&board), vec!["second"]);

        board.dismiss(first);
        assert_eq!(board.len(), 1);

        board.clear();
        assert_eq!(board.len(), 0);
    }
}
