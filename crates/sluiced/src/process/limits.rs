use nix::sys::resource::{Resource, getrlimit, setrlimit};
use tracing::info;

use super::PROCESS_TARGET;
use crate::errors::ResourceError;

/// Applies the open file limit.
pub trait FileLimit: Send + Sync {
    /// Sets the soft and hard `RLIMIT_NOFILE` to `limit`.
    ///
    /// # Errors
    ///
    /// Fails when the kernel refuses the limit.
    fn raise(&self, limit: u64) -> Result<(), ResourceError>;
}

/// `setrlimit`-backed limit.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFileLimit;

impl FileLimit for SystemFileLimit {
    fn raise(&self, limit: u64) -> Result<(), ResourceError> {
        let error = |source| ResourceError::FileLimit { limit, source };
        let (soft, hard) = getrlimit(Resource::RLIMIT_NOFILE).map_err(error)?;
        setrlimit(Resource::RLIMIT_NOFILE, limit, limit).map_err(error)?;
        info!(
            target: PROCESS_TARGET,
            previous_soft = soft,
            previous_hard = hard,
            limit,
            "open file limit applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn current_soft_limit_can_be_reapplied_when_equal_to_hard() {
        let (soft, hard) = getrlimit(Resource::RLIMIT_NOFILE).expect("getrlimit");
        if soft != hard {
            return;
        }
        SystemFileLimit.raise(soft).expect("reapply limit");
    }

    #[rstest]
    fn unbounded_request_above_hard_limit_fails_for_unprivileged_users() {
        if nix::unistd::geteuid().is_root() {
            return;
        }
        let (_, hard) = getrlimit(Resource::RLIMIT_NOFILE).expect("getrlimit");
        let Some(above) = hard.checked_add(1) else {
            return;
        };
        let error = SystemFileLimit.raise(above).expect_err("above hard limit");
        assert!(matches!(error, ResourceError::FileLimit { .. }));
    }
}
