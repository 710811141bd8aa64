use tokio::sync::oneshot;

use crate::platform::RemoteUpdate;

/// A parsed update, consumed exactly once by the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub update_id: i64,
    pub chat_id: i64,
    pub user_id: i64,
    pub username: String,
    /// First whitespace-delimited word of the text
    pub root: String,
    pub args: Vec<String>,
}

impl Command {
    /// Build a command from an update; `None` when the text is blank.
    pub fn from_update(update: &RemoteUpdate) -> Option<Self> {
        let (root, args) = tokenize(&update.text)?;
        Some(Self {
            update_id: update.update_id,
            chat_id: update.chat_id,
            user_id: update.user_id,
            username: update.username.clone(),
            root,
            args,
        })
    }
}

/// A command on its way to the dispatch loop. The poller waits on the
/// paired receiver, so it never fetches again before the command is handled.
#[derive(Debug)]
pub struct Handoff {
    pub command: Command,
    done: oneshot::Sender<()>,
}

impl Handoff {
    pub fn new(command: Command) -> (Self, oneshot::Receiver<()>) {
        let (done, handled) = oneshot::channel();
        (Self { command, done }, handled)
    }

    /// Release the waiting poller.
    pub fn complete(self) {
        // The poller may already have stopped.
        let _ = self.done.send(());
    }
}

/// Split `text` on whitespace into a root token and its arguments.
pub fn tokenize(text: &str) -> Option<(String, Vec<String>)> {
    let mut words = text.split_whitespace().map(str::to_string);
    let root = words.next()?;
    Some((root, words.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_word() {
        let (root, args) = tokenize("register").unwrap();
        assert_eq!(root, "register");
        assert!(args.is_empty());
    }

    #[test]
    fn test_root_and_args() {
        let (root, args) = tokenize("getid extra args").unwrap();
        assert_eq!(root, "getid");
        assert_eq!(args, vec!["extra", "args"]);
    }

    #[test]
    fn test_irregular_whitespace() {
        let (root, args) = tokenize("  /subscribe\t now \n please ").unwrap();
        assert_eq!(root, "/subscribe");
        assert_eq!(args, vec!["now", "please"]);
    }

    #[test]
    fn test_blank_yields_nothing() {
        assert!(tokenize("").is_none());
        assert!(tokenize("   \n\t ").is_none());
    }

    #[test]
    fn test_from_update_copies_identity() {
        let update = RemoteUpdate {
            update_id: 9,
            user_id: 42,
            chat_id: 4242,
            username: "alice".to_string(),
            text: "/getid".to_string(),
        };
        let cmd = Command::from_update(&update).unwrap();
        assert_eq!(cmd.update_id, 9);
        assert_eq!(cmd.user_id, 42);
        assert_eq!(cmd.chat_id, 4242);
        assert_eq!(cmd.username, "alice");
        assert_eq!(cmd.root, "/getid");
    }

    #[test]
    fn test_from_update_blank_text() {
        let update = RemoteUpdate {
            update_id: 9,
            user_id: 42,
            chat_id: 42,
            username: String::new(),
            text: "  ".to_string(),
        };
        assert!(Command::from_update(&update).is_none());
    }

    #[tokio::test]
    async fn test_handoff_completion_releases_waiter() {
        let command = tokenize("/getid").map(|(root, args)| Command {
            update_id: 1,
            chat_id: 42,
            user_id: 42,
            username: "alice".to_string(),
            root,
            args,
        });
        let (handoff, handled) = Handoff::new(command.unwrap());
        handoff.complete();
        assert!(handled.await.is_ok());
    }

    #[tokio::test]
    async fn test_dropped_handoff_reports_closed() {
        let (handoff, handled) = Handoff::new(Command {
            update_id: 1,
            chat_id: 42,
            user_id: 42,
            username: "alice".to_string(),
            root: "/getid".to_string(),
            args: Vec::new(),
        });
        drop(handoff);
        assert!(handled.await.is_err());
    }
}
