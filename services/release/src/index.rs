//! Static HTML index of recent releases.

use crate::catalog::{build_catalog, Section};
use crate::gateway::{StorageError, StorageGateway};
use askama::Template;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors produced while building the index page
#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to render index: {0}")]
    Render(#[from] askama::Error),

    #[error("Failed to write index to {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Template)]
#[template(path = "index.html", escape = "none")]
struct IndexPage<'a> {
    title: &'a str,
    sections: &'a [Section],
    commit_url_prefix: &'a str,
}

/// List each prefix and build one section per prefix, in order.
///
/// Any listing failure aborts the whole index.
pub async fn collect_sections(
    gateway: &dyn StorageGateway,
    prefixes: &[String],
    suffix: &str,
    limit: usize,
) -> Result<Vec<Section>, StorageError> {
    let base_url = gateway.public_base_url();
    let mut sections = Vec::with_capacity(prefixes.len());

    for prefix in prefixes {
        let blobs = gateway.list(prefix).await?;
        let releases = build_catalog(
            &blobs,
            &format!("{}{}", base_url, prefix),
            prefix,
            suffix,
            limit,
        );

        if !releases.is_empty() {
            info!(prefix = %prefix, count = releases.len(), "Found releases");
            for release in &releases {
                info!(
                    name = %release.name,
                    version = %release.version,
                    date = %release.date_string,
                    "Release"
                );
            }
        }

        sections.push(Section {
            header: prefix.clone(),
            releases,
        });
    }

    Ok(sections)
}

/// Render the index page
pub fn render_index(
    title: &str,
    sections: &[Section],
    commit_url_prefix: &str,
) -> Result<String, IndexError> {
    let page = IndexPage {
        title,
        sections,
        commit_url_prefix,
    };
    Ok(page.render()?)
}

/// Render the index page and write it to `path`, creating parent directories.
/// An empty path writes nothing.
pub fn write_index(
    path: &str,
    title: &str,
    sections: &[Section],
    commit_url_prefix: &str,
) -> Result<(), IndexError> {
    if path.is_empty() {
        return Ok(());
    }

    let html = render_index(title, sections, commit_url_prefix)?;
    let write_err = |source: std::io::Error| IndexError::Write {
        path: path.to_string(),
        source,
    };

    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, html).map_err(write_err)?;

    info!(path = %path, "Index written");
    Ok(())
}
