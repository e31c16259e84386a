use std::os::fd::OwnedFd;

use nix::fcntl::OFlag;
use nix::unistd;

/// One inter-stage pipe. Both endpoints are move-only and close on drop, so
/// the parent cannot keep a forwarded endpoint alive past the fork that hands
/// it over — a leaked write end would keep the consumer from ever seeing EOF.
#[derive(Debug)]
pub struct Channel {
	pub read: OwnedFd,
	pub write: OwnedFd,
}

impl Channel {
	/// Allocated with O_CLOEXEC: endpoints inherited by a child vanish at
	/// exec, while the dup2 copies wired onto fd 0/1 lose the flag and
	/// survive into the spawned program.
	pub fn open() -> nix::Result<Channel> {
		let (read, write) = unistd::pipe2(OFlag::O_CLOEXEC)?;
		Ok(Channel { read, write })
	}
}
