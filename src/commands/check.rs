//! Render and check the site without writing anything

use anyhow::Result;
use std::time::Instant;

use super::log_failure;
use crate::Site;

pub fn run(site: &Site, drafts: bool) -> Result<()> {
    let start = Instant::now();

    match site.render(drafts) {
        Ok(rendered) => {
            println!(
                "OK: {} files, no errors ({:.2}s)",
                rendered.len(),
                start.elapsed().as_secs_f64()
            );
            Ok(())
        }
        Err(e) => {
            log_failure(&e);
            Err(e)
        }
    }
}
