// sprig-core/src/docs.rs
//! Manual page generation.
//!
//! The page structure is fixed; only its content comes from the recipe.
//! Rendering is a pure function of the page, the recipe and the render time.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use sprig_aio::fs::atomic_write_file;
use sprig_common::config::Config;
use sprig_common::error::Result;
use sprig_common::model::{ManEntry, ManPage, ManSection, Recipe, SectionAnchor};
use tracing::debug;

use crate::template::TemplateVars;

/// Renders `page` as a roff document.
pub fn render_manpage(page: &ManPage, recipe: &Recipe, render_time: DateTime<Utc>) -> String {
    let vars = TemplateVars::for_recipe(recipe, render_time);
    let mut out = Roff::new(&vars);
    let program = &recipe.program;

    out.macro_line(&format!(
        ".TH {} {} \"{}\" \"{} {}\"",
        escape(&program.to_uppercase()),
        page.section,
        render_time.format("%B %Y"),
        escape(program),
        escape(recipe.version())
    ));

    out.heading("NAME");
    out.text_line(&format!("{program} - {}", vars.render(&page.summary)));

    out.heading("SYNOPSIS");
    out.macro_line(&format!(".B {}", escape(program)));
    if let Some(synopsis) = &page.synopsis {
        out.text_line(&vars.render(synopsis));
    }

    if !page.description.is_empty() {
        out.heading("DESCRIPTION");
        out.paragraphs(&page.description);
    }
    out.extra_sections(page, SectionAnchor::Description);

    out.entry_section("OPTIONS", &page.options);
    let commands_title = page.commands_title.as_deref().unwrap_or("COMMANDS");
    out.entry_section(commands_title, &page.commands);
    out.extra_sections(page, SectionAnchor::Commands);

    out.entry_section("FILES", &page.files);
    out.extra_sections(page, SectionAnchor::Files);

    out.entry_section("EXAMPLES", &page.examples);
    out.extra_sections(page, SectionAnchor::Examples);

    if !page.exit_status.is_empty() {
        out.heading("EXIT STATUS");
        for status in &page.exit_status {
            out.macro_line(".TP");
            out.macro_line(&format!(".B {}", status.code));
            out.text_line(&vars.render(&status.meaning));
        }
    }
    out.extra_sections(page, SectionAnchor::ExitStatus);

    if !page.see_also.is_empty() {
        out.heading("SEE ALSO");
        let last = page.see_also.len() - 1;
        for (i, reference) in page.see_also.iter().enumerate() {
            let (name, section) = split_reference(reference);
            let comma = if i < last { "," } else { "" };
            out.macro_line(&format!(".BR {} ({section}){comma}", escape(name)));
        }
    }

    if let Some(author) = &page.author {
        out.heading("AUTHOR");
        out.text_block(author);
    }
    if let Some(bugs) = &page.bugs {
        out.heading("REPORTING BUGS");
        out.text_block(bugs);
    }
    if let Some(copyright) = &page.copyright {
        out.heading("COPYRIGHT");
        out.text_block(copyright);
    }
    out.finish()
}

/// Renders and writes the page to `man<section>/<program>.<section>`,
/// replacing whatever was there.
pub fn write_manpage(
    page: &ManPage,
    recipe: &Recipe,
    config: &Config,
    render_time: DateTime<Utc>,
) -> Result<PathBuf> {
    let text = render_manpage(page, recipe, render_time);
    let path = config
        .man_dir(page.section)
        .join(format!("{}.{}", recipe.program, page.section));
    atomic_write_file(&path, text.as_bytes(), 0o644)?;
    debug!("Wrote manual page {} ({} bytes)", path.display(), text.len());
    Ok(path)
}

/// `osascript(1)` or `purge (8)` style references; bare names default to section 1.
fn split_reference(reference: &str) -> (&str, &str) {
    let trimmed = reference.trim();
    if let Some(open) = trimmed.rfind('(') {
        if let Some(section) = trimmed[open + 1..].strip_suffix(')') {
            return (trimmed[..open].trim_end(), section);
        }
    }
    (trimmed, "1")
}

/// Escapes text for roff: backslashes and hyphens, plus a leading control
/// character that would otherwise start a request.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    if text.starts_with('.') || text.starts_with('\'') {
        out.push_str("\\&");
    }
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\e"),
            '-' => out.push_str("\\-"),
            _ => out.push(c),
        }
    }
    out
}

struct Roff<'a> {
    buf: String,
    vars: &'a TemplateVars,
}

impl<'a> Roff<'a> {
    fn new(vars: &'a TemplateVars) -> Self {
        Self {
            buf: String::with_capacity(4096),
            vars,
        }
    }

    fn macro_line(&mut self, line: &str) {
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    /// Escaped text, one output line per input line; blank lines are dropped.
    fn text_line(&mut self, text: &str) {
        for line in text.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
            let _ = writeln!(self.buf, "{}", escape(line));
        }
    }

    /// Templated text where blank lines separate paragraphs.
    fn text_block(&mut self, text: &str) {
        let rendered = self.vars.render(text);
        let mut first = true;
        for para in rendered.split("\n\n").filter(|p| !p.trim().is_empty()) {
            if !first {
                self.macro_line(".PP");
            }
            let lines: Vec<&str> = para.lines().filter(|l| !l.trim().is_empty()).collect();
            for (i, line) in lines.iter().enumerate() {
                if i > 0 {
                    self.macro_line(".br");
                }
                self.text_line(line);
            }
            first = false;
        }
    }

    fn heading(&mut self, title: &str) {
        let _ = writeln!(self.buf, ".SH {}", escape(title));
    }

    fn paragraphs(&mut self, paragraphs: &[String]) {
        for (i, para) in paragraphs.iter().enumerate() {
            if i > 0 {
                self.macro_line(".PP");
            }
            let rendered = self.vars.render(para);
            self.text_line(&rendered);
        }
    }

    fn entries(&mut self, entries: &[ManEntry]) {
        for entry in entries {
            self.macro_line(".TP");
            let term = self.vars.render(&entry.term);
            self.macro_line(&format!(".B {}", escape(&term)));
            let description = self.vars.render(&entry.description);
            self.text_line(&description);
        }
    }

    fn entry_section(&mut self, title: &str, entries: &[ManEntry]) {
        if entries.is_empty() {
            return;
        }
        self.heading(title);
        self.entries(entries);
    }

    fn list(&mut self, items: &[String], numbered: bool) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.macro_line(".br");
            }
            let rendered = self.vars.render(item);
            if numbered {
                self.text_line(&format!("{}. {rendered}", i + 1));
            } else {
                self.text_line(&format!("\u{2022} {rendered}"));
            }
        }
    }

    fn section(&mut self, section: &ManSection) {
        self.heading(&section.title);
        self.paragraphs(&section.paragraphs);
        if !section.items.is_empty() {
            if !section.paragraphs.is_empty() {
                self.macro_line(".PP");
            }
            self.list(&section.items, section.numbered);
        }
        if !section.trailer.is_empty() {
            self.macro_line(".PP");
            self.paragraphs(&section.trailer);
        }
        self.entries(&section.entries);
    }

    fn extra_sections(&mut self, page: &ManPage, anchor: SectionAnchor) {
        for section in page.sections_after(anchor) {
            self.section(section);
        }
    }

    fn finish(self) -> String {
        self.buf
    }
}
