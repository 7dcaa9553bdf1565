//! CLI subcommands

pub mod build;
pub mod check;
pub mod clean;
pub mod init;
pub mod list;
pub mod new;

use crate::BuildFailed;

/// Log each error of a failed build on its own line
pub(crate) fn log_failure(err: &anyhow::Error) {
    match err.downcast_ref::<BuildFailed>() {
        Some(failed) => {
            for error in failed.errors() {
                tracing::error!("{}", error);
            }
            tracing::error!(
                "Build failed with {} error(s); nothing was written",
                failed.errors().len()
            );
        }
        None => tracing::error!("{:#}", err),
    }
}
