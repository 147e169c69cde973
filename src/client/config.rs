//! Per-server launch configuration.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Identifier for one running language server instance.
///
/// Ids are never reused: a restarted server gets a fresh id, so events
/// from a torn-down instance can be recognized as stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerId(pub u64);

impl fmt::Display for ServerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "LSP#{}", self.0)
	}
}

/// Everything needed to launch one server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
	pub id: ServerId,
	pub command: String,
	pub args: Vec<String>,
	pub env: HashMap<String, String>,
	/// Workspace root; becomes the child's working directory and the
	/// `rootUri` sent in `initialize`.
	pub root_path: PathBuf,
	/// Per-request deadline. [`Duration::ZERO`] disables the timeout.
	pub request_timeout: Duration,
}

impl ServerConfig {
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

	pub fn new(id: ServerId, command: impl Into<String>, root_path: impl Into<PathBuf>) -> Self {
		Self {
			id,
			command: command.into(),
			args: Vec::new(),
			env: HashMap::new(),
			root_path: root_path.into(),
			request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
		}
	}

	pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
		self.args = args.into_iter().map(Into::into).collect();
		self
	}

	pub fn env(mut self, env: HashMap<String, String>) -> Self {
		self.env = env;
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}
}
