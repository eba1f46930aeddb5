#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

pub const HEADER: &str = "eventid,iyear,country_txt,attacktype1_txt,targtype1_txt,gname,nkill,nwound";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Writes an incident export with [`HEADER`] and one line per row.
    pub fn write_incidents(&self, name: &str, rows: &[Incident<'_>]) -> PathBuf {
        let mut contents = String::from(HEADER);
        contents.push('\n');
        for (idx, row) in rows.iter().enumerate() {
            contents.push_str(&row.to_line(idx + 1));
            contents.push('\n');
        }
        self.write(name, &contents)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Incident<'a> {
    pub year: &'a str,
    pub country: &'a str,
    pub attack_type: &'a str,
    pub target_type: &'a str,
    pub group: &'a str,
    pub killed: &'a str,
    pub wounded: &'a str,
}

impl<'a> Incident<'a> {
    pub fn new(year: &'a str, country: &'a str, group: &'a str) -> Self {
        Self {
            year,
            country,
            attack_type: "Bombing/Explosion",
            target_type: "Private Citizens & Property",
            group,
            killed: "1",
            wounded: "0",
        }
    }

    pub fn attack(mut self, attack_type: &'a str) -> Self {
        self.attack_type = attack_type;
        self
    }

    pub fn target(mut self, target_type: &'a str) -> Self {
        self.target_type = target_type;
        self
    }

    pub fn casualties(mut self, killed: &'a str, wounded: &'a str) -> Self {
        self.killed = killed;
        self.wounded = wounded;
        self
    }

    fn to_line(self, id: usize) -> String {
        let quote = |value: &str| {
            if value.contains(',') || value.contains('"') {
                format!("\"{}\"", value.replace('"', "\"\""))
            } else {
                value.to_string()
            }
        };
        [
            format!("{id}"),
            quote(self.year),
            quote(self.country),
            quote(self.attack_type),
            quote(self.target_type),
            quote(self.group),
            quote(self.killed),
            quote(self.wounded),
        ]
        .join(",")
    }
}
