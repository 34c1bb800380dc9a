//! Managed section of the host file

use std::io::Write;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use indexmap::IndexMap;
use log::{debug, info, warn};
use regex::Regex;

use crate::error::{HostsError, Result};
use crate::promote::HostFilePromoter;

pub const BEGIN_MARKER: &str = "# BEGIN vith section";
pub const END_MARKER: &str = "# END vith section";

fn host_line_regex() -> &'static Regex {
    static HOST_LINE: OnceLock<Regex> = OnceLock::new();
    HOST_LINE.get_or_init(|| {
        Regex::new(r"^(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\s+([\w\-_.]+)$").unwrap()
    })
}

/// The vith-owned bindings of a host file, together with the surrounding
/// lines needed to write it back.
///
/// Loaded fresh for each synchronization and consumed by [`save`]. Lines
/// inside the original section that are not `<ipv4> <hostname>` entries are
/// not kept and disappear on the next save. Matching entries keep their
/// address text as written, even when it is not a canonical IPv4 address.
///
/// [`save`]: ManagedHostSection::save
#[derive(Debug, Clone)]
pub struct ManagedHostSection {
    path: PathBuf,
    /// Original lines, each with its terminator
    lines: Vec<String>,
    begin: Option<usize>,
    end: Option<usize>,
    /// Hostname to address, as written in the file
    bindings: IndexMap<String, String>,
    dropped_lines: usize,
    changed: bool,
}

impl ManagedHostSection {
    /// Read and parse the host file at `path`.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| HostsError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let section = Self::parse(path, &content);
        debug!(
            "Loaded {} vith bindings from {:?}",
            section.bindings.len(),
            path
        );
        if section.dropped_lines > 0 {
            warn!(
                "{} unrecognized line(s) inside the vith section of {:?} will be dropped on save",
                section.dropped_lines, path
            );
        }
        Ok(section)
    }

    /// Parse host file content. `path` is where [`save`](Self::save) writes.
    pub fn parse<P: AsRef<Path>>(path: P, content: &str) -> Self {
        let mut section = Self {
            path: path.as_ref().to_path_buf(),
            lines: content.split_inclusive('\n').map(str::to_string).collect(),
            begin: None,
            end: None,
            bindings: IndexMap::new(),
            dropped_lines: 0,
            changed: false,
        };

        let regex = host_line_regex();
        for (index, line) in section.lines.iter().enumerate() {
            if section.begin.is_none() {
                if line.starts_with(BEGIN_MARKER) {
                    section.begin = Some(index);
                }
            } else if section.end.is_none() {
                if line.starts_with(END_MARKER) {
                    section.end = Some(index);
                    break;
                }
                let trimmed = line.trim();
                match regex.captures(trimmed) {
                    Some(caps) => {
                        section
                            .bindings
                            .insert(caps[2].to_string(), caps[1].to_string());
                    }
                    None if !trimmed.is_empty() => section.dropped_lines += 1,
                    None => {}
                }
            }
        }

        section
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file had a vith section when it was loaded.
    pub fn has_section(&self) -> bool {
        self.begin.is_some()
    }

    /// Bindings in file order, with addresses as written.
    pub fn bindings(&self) -> &IndexMap<String, String> {
        &self.bindings
    }

    /// Address bound to `hostname`, if it is a valid IPv4 address.
    pub fn get(&self, hostname: &str) -> Option<Ipv4Addr> {
        self.bindings.get(hostname)?.parse().ok()
    }

    /// Whether any binding changed since load.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Bind `hostname` to `address`. Returns whether this call changed anything.
    pub fn ensure_present(&mut self, hostname: &str, address: Ipv4Addr) -> bool {
        let address = address.to_string();
        if self.bindings.get(hostname) == Some(&address) {
            return false;
        }
        self.bindings.insert(hostname.to_string(), address);
        self.changed = true;
        true
    }

    /// Drop any binding for `hostname`. Returns whether this call changed anything.
    pub fn ensure_absent(&mut self, hostname: &str) -> bool {
        if self.bindings.shift_remove(hostname).is_none() {
            return false;
        }
        self.changed = true;
        true
    }

    /// Full file content with the current bindings in place of the original section.
    pub fn render(&self) -> String {
        let mut section = String::new();
        if !self.bindings.is_empty() {
            section.push_str(BEGIN_MARKER);
            section.push('\n');
            for (hostname, address) in &self.bindings {
                section.push_str(&format!("{} {}\n", address, hostname));
            }
            section.push_str(END_MARKER);
            section.push('\n');
        }

        let mut output = String::new();
        match self.begin {
            Some(begin) => {
                let tail = self.end.map_or(self.lines.len(), |end| end + 1);
                self.lines[..begin]
                    .iter()
                    .for_each(|line| output.push_str(line));
                output.push_str(&section);
                self.lines[tail..]
                    .iter()
                    .for_each(|line| output.push_str(line));
            }
            None => {
                self.lines.iter().for_each(|line| output.push_str(line));
                if !section.is_empty() && !output.is_empty() && !output.ends_with('\n') {
                    output.push('\n');
                }
                output.push_str(&section);
            }
        }
        output
    }

    /// Stage the rendered file privately, then hand it to `promoter` to
    /// replace the real file.
    ///
    /// The staged copy is independent of the target, so a failed promotion
    /// leaves the original file untouched.
    pub async fn save(self, promoter: &dyn HostFilePromoter) -> Result<()> {
        let content = self.render();

        let mut staged = tempfile::Builder::new()
            .prefix("vith-hosts-")
            .tempfile()
            .map_err(|source| HostsError::Stage { source })?;
        staged
            .write_all(content.as_bytes())
            .and_then(|_| staged.flush())
            .map_err(|source| HostsError::Stage { source })?;

        // Promotion creates a fresh file from the staged copy; keep the
        // target's mode instead of the private 0600 of the staging file.
        if let Ok(metadata) = tokio::fs::metadata(&self.path).await {
            tokio::fs::set_permissions(staged.path(), metadata.permissions())
                .await
                .map_err(|source| HostsError::Stage { source })?;
        }

        promoter.promote(staged.path(), &self.path).await?;
        info!(
            "Wrote {} vith binding(s) to {:?}",
            self.bindings.len(),
            self.path
        );
        Ok(())
    }

    /// Save only when a binding changed. Returns whether a write happened.
    pub async fn save_if_changed(self, promoter: &dyn HostFilePromoter) -> Result<bool> {
        if !self.changed {
            debug!("vith section of {:?} unchanged, not writing", self.path);
            return Ok(false);
        }
        self.save(promoter).await?;
        Ok(true)
    }
}
