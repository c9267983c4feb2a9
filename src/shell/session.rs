use tracing::debug;

use crate::filesystem::{EntryId, Tree, resolve};
use crate::shell::Command;

/// Everything a dispatched command wants printed, plus whether the
/// session should end. Kept free of terminal I/O so dispatch is testable.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reply {
    pub lines: Vec<String>,
    pub exit: bool,
}

impl Reply {
    fn say(line: impl Into<String>) -> Self {
        Reply {
            lines: vec![line.into()],
            exit: false,
        }
    }

    fn quiet() -> Self {
        Reply::default()
    }

    fn exit() -> Self {
        Reply {
            lines: Vec::new(),
            exit: true,
        }
    }
}

/// One interactive session: a namespace tree plus the current-directory
/// cursor. The cursor always points at a live directory of `tree`.
pub struct Session {
    tree: Tree,
    cursor: EntryId,
}

impl Session {
    pub fn new() -> Self {
        Self::with_tree(Tree::new())
    }

    /// Starts a session over a tree loaded from a snapshot.
    pub fn with_tree(tree: Tree) -> Self {
        let cursor = tree.root();
        Session { tree, cursor }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The console prompt: the cursor's absolute path.
    pub fn prompt(&self) -> String {
        format!("{}>", self.tree.path_to_string(self.cursor))
    }

    /// Parses and runs one console line. Every error here is recoverable:
    /// it becomes a reply line and the tree and cursor stay as they were.
    pub fn dispatch(&mut self, line: &str) -> Reply {
        let command = Command::parse(line);
        debug!("Dispatching {:?}", command);
        match command {
            Command::Mkdir { name } => {
                match self.tree.create_directory(self.cursor, &name) {
                    Ok(_) => Reply::say(format!("Directory '{name}' created")),
                    Err(error) => Reply::say(error.to_string()),
                }
            }
            Command::Touch { name, content } => {
                match self.tree.create_file(self.cursor, &name, content.as_bytes()) {
                    Ok(_) => Reply::say(format!("File '{name}' created")),
                    Err(error) => Reply::say(error.to_string()),
                }
            }
            Command::Ls => Reply {
                lines: self
                    .tree
                    .list_children(self.cursor)
                    .into_iter()
                    .map(|(name, _)| name)
                    .collect(),
                exit: false,
            },
            Command::Cd { path } => match resolve(&self.tree, self.cursor, &path) {
                Ok(target) => {
                    self.cursor = target;
                    Reply::quiet()
                }
                Err(error) => Reply::say(error.to_string()),
            },
            Command::Format => {
                self.cursor = self.tree.format();
                Reply::say("Disk formatted")
            }
            Command::Exit => Reply::exit(),
            Command::Nothing => Reply::quiet(),
            Command::Malformed { usage } => Reply::say(format!("Usage: {usage}")),
            Command::Unknown { verb } => Reply::say(format!("Unknown command: {verb}")),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
