//! Remove the destination directory

use anyhow::{bail, Result};

use crate::Site;

pub fn run(site: &Site) -> Result<()> {
    if site.source_dir.starts_with(&site.dest_dir) {
        bail!(
            "Refusing to delete {:?}: it contains the source directory",
            site.dest_dir
        );
    }
    site.clean()
}
