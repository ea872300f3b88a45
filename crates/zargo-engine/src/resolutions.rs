//! The resolutions store: per-source lockfile entries plus the bindings
//! between dependency-table slots and entries, and the line-oriented
//! lockfile codec.
//!
//! Lockfile format: LF-delimited lines, first whitespace-separated token is
//! the source tag, remainder is driver-specific. Malformed lines for a known
//! tag are warned about and dropped; an unknown tag fails the whole load.

use std::io::{self, Write};
use std::str::SplitWhitespace;

use zargo_sources::driver::{Entry, SourceDriver};
use zargo_sources::git::GitDriver;
use zargo_sources::local::LocalDriver;
use zargo_sources::pkg::PkgDriver;
use zargo_sources::url::UrlDriver;
use zargo_util::errors::ZargoError;

/// One source's slice of the store: its resolution entries in load/append
/// order plus the `(dep_idx, res_idx)` pairs bound during this run.
pub struct Table<D: SourceDriver> {
    pub entries: Vec<Entry<D::Resolution>>,
    /// At most one pair per dep_idx; multiple pairs may share a res_idx
    /// (several graph nodes resolved by one entry).
    pub binds: Vec<(usize, usize)>,
}

impl<D: SourceDriver> std::fmt::Debug for Table<D>
where
    D::Resolution: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("entries", &self.entries)
            .field("binds", &self.binds)
            .finish()
    }
}

impl<D: SourceDriver> Default for Table<D> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            binds: Vec::new(),
        }
    }
}

impl<D: SourceDriver> Table<D> {
    fn parse_line(&mut self, fields: &mut SplitWhitespace<'_>, line_no: usize, raw: &str) {
        match D::parse_entry(fields) {
            Ok(res) => self.entries.push(Entry::loaded(res)),
            Err(e) => {
                tracing::warn!("zargo.lock line {line_no}: {e}; dropping `{raw}`");
            }
        }
    }

    fn write(&self, out: &mut dyn Write) -> io::Result<()> {
        for entry in &self.entries {
            D::write_entry(&entry.res, out)?;
        }
        Ok(())
    }
}

/// All resolution entries of a run, one table per source kind.
#[derive(Debug, Default)]
pub struct Resolutions {
    pub pkg: Table<PkgDriver>,
    pub local: Table<LocalDriver>,
    pub url: Table<UrlDriver>,
    pub git: Table<GitDriver>,
}

impl Resolutions {
    /// Parse lockfile text. Empty input yields an empty store.
    ///
    /// Per-line failures are dropped with a warning naming the line number,
    /// the error, and the raw line; an unrecognized source tag aborts the
    /// load after logging a full explanation.
    pub fn parse(text: &str) -> Result<Self, ZargoError> {
        let mut store = Self::default();
        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let mut fields = line.split_whitespace();
            let Some(tag) = fields.next() else {
                continue;
            };
            match tag {
                "pkg" => store.pkg.parse_line(&mut fields, line_no, line),
                "local" => store.local.parse_line(&mut fields, line_no, line),
                "url" => store.url.parse_line(&mut fields, line_no, line),
                "git" => store.git.parse_line(&mut fields, line_no, line),
                other => {
                    tracing::error!(
                        "zargo.lock line {line_no}: unknown source tag `{other}` in `{line}`; \
                         this lockfile was written by a newer zargo or is corrupt"
                    );
                    return Err(ZargoError::Explained);
                }
            }
        }
        Ok(store)
    }

    /// Emit every entry, sources in fixed order, entries in table order.
    pub fn write(&self, out: &mut dyn Write) -> io::Result<()> {
        self.pkg.write(out)?;
        self.local.write(out)?;
        self.url.write(out)?;
        self.git.write(out)
    }

    /// The store rendered as lockfile text.
    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        self.write(&mut buf).expect("writing to a Vec cannot fail");
        String::from_utf8(buf).expect("lockfile text is UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_store() {
        let store = Resolutions::parse("").unwrap();
        assert!(store.pkg.entries.is_empty());
        assert!(store.local.entries.is_empty());
        assert!(store.url.entries.is_empty());
        assert!(store.git.entries.is_empty());
    }

    #[test]
    fn malformed_line_is_dropped_and_rest_survives() {
        let text = "pkg u a 1.0.0 deadbeef\npkg garbage\npkg u b 2.0.0 cafef00d\n";
        let store = Resolutions::parse(text).unwrap();
        assert_eq!(store.pkg.entries.len(), 2);
        assert_eq!(store.pkg.entries[0].res.name, "a");
        assert_eq!(store.pkg.entries[1].res.name, "b");
    }

    #[test]
    fn unknown_tag_aborts_as_explained() {
        let err = Resolutions::parse("hg https://example.com tip\n").unwrap_err();
        assert!(matches!(err, ZargoError::Explained));
    }

    #[test]
    fn entries_load_stale() {
        let store = Resolutions::parse("local tools/opts\n").unwrap();
        assert!(!store.local.entries[0].is_fresh());
    }

    #[test]
    fn round_trip_over_accepted_lines() {
        let text = "pkg u a 1.0.0 deadbeef\n\
                    local tools/opts\n\
                    url https://example.com/x.zip cafef00d\n\
                    git https://github.com/x/args v1 0123abc\n";
        let store = Resolutions::parse(text).unwrap();
        assert_eq!(store.to_text(), text);
    }

    #[test]
    fn round_trip_drops_only_rejected_lines() {
        let text = "pkg u a 1.0.0 deadbeef\nurl onlyurl\n";
        let store = Resolutions::parse(text).unwrap();
        assert_eq!(store.to_text(), "pkg u a 1.0.0 deadbeef\n");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let store = Resolutions::parse("\n\npkg u a 1.0.0 aa\n\n").unwrap();
        assert_eq!(store.pkg.entries.len(), 1);
    }
}
