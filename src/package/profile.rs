//! Minimal reader/writer for Conan profile files (INI style).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Entry(String, String),
    /// Kept as written: `[tool_requires]` references, `include(...)`.
    Verbatim(String),
}

/// Sections of `key=value` entries, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConanProfile {
    /// Lines ahead of the first section, such as `include(default)`.
    preamble: Vec<String>,
    sections: Vec<(String, Vec<Line>)>,
}

impl ConanProfile {
    /// Parse profile text. Comments are dropped; lines without `=` are kept
    /// verbatim in place.
    pub fn parse(text: &str) -> Self {
        let mut profile = Self::default();
        let mut current: Option<usize> = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = Some(profile.section_index(name.trim()));
                continue;
            }
            let Some(index) = current else {
                profile.preamble.push(line.to_string());
                continue;
            };
            let entry = match line.split_once('=') {
                Some((key, value)) => Line::Entry(key.trim().to_string(), value.trim().to_string()),
                None => Line::Verbatim(line.to_string()),
            };
            profile.sections[index].1.push(entry);
        }
        profile
    }

    fn section_index(&mut self, name: &str) -> usize {
        match self.sections.iter().position(|(section, _)| section == name) {
            Some(index) => index,
            None => {
                self.sections.push((name.to_string(), Vec::new()));
                self.sections.len() - 1
            }
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(name, _)| name == section)
            .and_then(|(_, lines)| {
                lines.iter().find_map(|line| match line {
                    Line::Entry(k, value) if k == key => Some(value.as_str()),
                    _ => None,
                })
            })
    }

    /// Set `key` in `section`, creating either as needed.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        let index = self.section_index(section);
        let value = value.into();
        let lines = &mut self.sections[index].1;
        let existing = lines.iter_mut().find_map(|line| match line {
            Line::Entry(k, v) if k == key => Some(v),
            _ => None,
        });
        match existing {
            Some(slot) => *slot = value,
            None => lines.push(Line::Entry(key.to_string(), value)),
        }
    }
}

impl fmt::Display for ConanProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.preamble {
            writeln!(f, "{line}")?;
        }
        for (index, (section, lines)) in self.sections.iter().enumerate() {
            if index > 0 || !self.preamble.is_empty() {
                writeln!(f)?;
            }
            writeln!(f, "[{section}]")?;
            for line in lines {
                match line {
                    Line::Entry(key, value) => writeln!(f, "{key}={value}")?,
                    Line::Verbatim(text) => writeln!(f, "{text}")?,
                }
            }
        }
        Ok(())
    }
}
