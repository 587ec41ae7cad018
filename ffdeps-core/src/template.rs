//! Path templates for locating files inside an extracted archive.
//!
//! Templates use the `{varname}` syntax. Only the variables in [`TemplateVar`]
//! are recognised; anything else inside braces is rejected at parse time.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Variables that can appear in a [`PathTemplate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateVar {
    /// `{rootFile}`: the single top-level entry produced by extraction.
    RootFile,
    /// `{archiveName}`: the downloaded file name without its compression suffix.
    ArchiveName,
}

impl TemplateVar {
    /// Token name as written between braces.
    pub fn token(&self) -> &'static str {
        match self {
            Self::RootFile => "rootFile",
            Self::ArchiveName => "archiveName",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "rootFile" => Some(Self::RootFile),
            "archiveName" => Some(Self::ArchiveName),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown template variable {{{name}}} in {template:?}")]
    UnknownVariable { name: String, template: String },

    #[error("Unclosed '{{' in template {0:?}")]
    Unclosed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Var(TemplateVar),
}

/// Values substituted for template variables.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub root_file: &'a str,
    pub archive_name: &'a str,
}

impl<'a> TemplateContext<'a> {
    fn value(&self, var: TemplateVar) -> &'a str {
        match var {
            TemplateVar::RootFile => self.root_file,
            TemplateVar::ArchiveName => self.archive_name,
        }
    }
}

/// A parsed, archive-relative path template such as `{rootFile}/bin/ffmpeg.exe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parses a template string.
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| TemplateError::Unclosed(template.to_string()))?;
            let name = &after[..close];
            let var = TemplateVar::from_token(name).ok_or_else(|| TemplateError::UnknownVariable {
                name: name.to_string(),
                template: template.to_string(),
            })?;
            segments.push(Segment::Var(var));
            rest = &after[close + 1..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    /// A template with no variables.
    pub fn literal(path: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Literal(path.into())],
        }
    }

    /// A path below the directory named by `var`, like `{rootFile}/bin/ffmpeg.exe`.
    pub fn under(var: TemplateVar, rest: &str) -> Self {
        Self {
            segments: vec![Segment::Var(var), Segment::Literal(format!("/{}", rest))],
        }
    }

    /// Returns true if the template references `var`.
    pub fn uses(&self, var: TemplateVar) -> bool {
        self.segments.iter().any(|s| *s == Segment::Var(var))
    }

    /// Substitutes every variable and returns the resulting path string.
    pub fn resolve(&self, ctx: &TemplateContext<'_>) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Var(var) => ctx.value(*var),
            })
            .collect()
    }
}

impl FromStr for PathTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Var(var) => write!(f, "{{{}}}", var.token())?,
            }
        }
        Ok(())
    }
}
