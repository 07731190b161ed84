//! Bundled HTML templates.
//!
//! Markdown is rendered with pulldown-cmark; text events are passed through
//! [`markup::tokenize`] so mentions, timecodes, issue references and
//! sidenotes become markup. Sidenotes and issues share one numbering per
//! page. Speaker turns render as:
//!
//! ```html
//! <div class="speaker hello" data-shortname="RP">
//!   <p class="name">Ray Peat</p>
//!   <div class="content">...</div>
//! </div>
//! ```
//!
//! The first turn of a speaker shows the full name, later turns the short
//! name, and retorts no name at all.

use crate::{
    asset::Asset,
    home::HomePage,
    markup::{self, Inline, Timecode},
    mention::{MentionPage, mention_url, popup_url},
    render::{RenderContext, Renderer},
    transcript::{Node, SpeakerTurn},
};
use pulldown_cmark::{CowStr, Event, Tag, TagEnd, html::push_html};
use rustc_hash::FxHashSet;
use std::fmt::Write;

/// Default templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

impl Renderer for HtmlRenderer {
    fn render_asset(&self, asset: &Asset, ctx: &RenderContext) -> anyhow::Result<String> {
        let mut main = String::new();
        write!(main, "<h1>{}</h1>", escape(asset.title()))?;
        if let Some(url) = asset.source_url() {
            write!(
                main,
                r#"<p class="source"><a href="{}">Source</a></p>"#,
                escape(url)
            )?;
        }

        if let Some(series) = &asset.front_matter().series {
            write!(main, r#"<p class="series">{}</p>"#, escape(series))?;
        }

        let mut state = PageState::new(asset.source_url());
        for node in asset.nodes() {
            match node {
                Node::Turn(turn) => render_turn(&mut main, turn, &mut state, ctx)?,
                Node::Prose { .. } => main.push_str(&markdown(node.text(), &mut state, ctx)),
            }
        }

        Ok(page(asset.title(), asset.url(), "asset", &main, ctx))
    }

    fn render_mention(&self, mention: &MentionPage, ctx: &RenderContext) -> anyhow::Result<String> {
        let mut main = String::new();
        write!(main, "<h1>{}</h1>", escape(mention.name))?;
        write_asset_list(&mut main, &mention.assets)?;
        Ok(page(mention.name, &mention.url(), "mention", &main, ctx))
    }

    fn render_popup(&self, mention: &MentionPage, _: &RenderContext) -> anyhow::Result<String> {
        let mut html = String::new();
        write!(
            html,
            r#"<div class="popup"><h2><a href="{}">{}</a></h2><p>Mentioned in {} {}</p>"#,
            mention.url(),
            escape(mention.name),
            mention.assets.len(),
            if mention.assets.len() == 1 { "document" } else { "documents" }
        )?;
        write_asset_list(&mut html, &mention.assets)?;
        html.push_str("</div>");
        Ok(html)
    }

    fn render_home(&self, home: &HomePage, ctx: &RenderContext) -> anyhow::Result<String> {
        let mut main = String::new();
        write!(main, "<h1>{}</h1>", escape(&ctx.config.base.title))?;
        write!(
            main,
            r#"<p class="progress"><progress value="{}" max="{}"></progress> {} transcribed</p>"#,
            home.progress.completed, home.progress.total, home.progress
        )?;
        if let Some(latest) = home.latest() {
            write!(
                main,
                r#"<p class="latest">Latest: <a href="{}">{}</a></p>"#,
                escape(latest.url()),
                escape(latest.title())
            )?;
        }
        write_asset_list(&mut main, &home.assets)?;
        Ok(page(&ctx.config.base.title, "/", "home", &main, ctx))
    }
}

/// Numbering and anchors shared by every node of one page.
struct PageState<'a> {
    source_url: Option<&'a str>,
    sidenotes: u32,
    anchors: FxHashSet<String>,
}

impl<'a> PageState<'a> {
    fn new(source_url: Option<&'a str>) -> Self {
        Self {
            source_url,
            sidenotes: 0,
            anchors: FxHashSet::default(),
        }
    }

    fn next_sidenote(&mut self) -> u32 {
        self.sidenotes += 1;
        self.sidenotes
    }
}

fn render_turn(
    out: &mut String,
    turn: &SpeakerTurn,
    state: &mut PageState,
    ctx: &RenderContext,
) -> std::fmt::Result {
    let class = match (turn.is_hello, turn.can_retort) {
        (_, true) => "speaker retort",
        (true, false) => "speaker hello",
        (false, false) => "speaker",
    };
    write!(
        out,
        r#"<div class="{class}" data-shortname="{}">"#,
        escape(&turn.short_name)
    )?;

    if !turn.can_retort {
        let name = if turn.is_hello {
            turn.display_name()
        } else {
            turn.short_name.as_str()
        };
        write!(out, r#"<p class="name">{}</p>"#, escape(name))?;
    }

    write!(
        out,
        r#"<div class="content">{}</div></div>"#,
        markdown(&turn.text, state, ctx)
    )
}

fn write_asset_list(out: &mut String, assets: &[&Asset]) -> std::fmt::Result {
    out.push_str("<ul>");
    for asset in assets {
        write!(
            out,
            r#"<li><a href="{}">{}</a></li>"#,
            escape(asset.url()),
            escape(asset.title())
        )?;
    }
    out.push_str("</ul>");
    Ok(())
}

/// Full document around `main`.
fn page(title: &str, url: &str, kind: &str, main: &str, ctx: &RenderContext) -> String {
    let site = &ctx.config.base.title;
    let canonical = ctx
        .config
        .base
        .url
        .as_deref()
        .map(|base| {
            format!(
                r#"<link rel="canonical" href="{}{}">"#,
                escape(base.trim_end_matches('/')),
                escape(url)
            )
        })
        .unwrap_or_default();

    format!(
        concat!(
            "<!DOCTYPE html>\n",
            r#"<html lang="en"><head><meta charset="utf-8">"#,
            r#"<meta name="viewport" content="width=device-width, initial-scale=1">"#,
            "<title>{title} | {site}</title>{canonical}",
            r#"<link rel="stylesheet" href="/style.css"></head>"#,
            r#"<body><header><a href="/">{site}</a></header>"#,
            r#"<main class="{kind}">{main}</main></body></html>"#,
            "\n"
        ),
        title = escape(title),
        site = escape(site),
        canonical = canonical,
        kind = kind,
        main = main,
    )
}

/// Render markdown with inline extensions.
fn markdown(text: &str, state: &mut PageState, ctx: &RenderContext) -> String {
    let mut events = Vec::new();
    let mut in_code = false;

    for event in markup::parse_events(text) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => {
                in_code = true;
                events.push(event);
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code = false;
                events.push(event);
            }
            Event::Text(text) if !in_code => {
                for token in markup::tokenize(&text) {
                    events.push(inline_event(token, state, ctx));
                }
            }
            event => events.push(event),
        }
    }

    let mut html = String::new();
    push_html(&mut html, events.into_iter());
    html
}

fn inline_event<'a>(token: Inline<'_>, state: &mut PageState, ctx: &RenderContext) -> Event<'a> {
    match token {
        Inline::Text(text) => Event::Text(CowStr::from(text.to_owned())),
        token => Event::InlineHtml(CowStr::from(inline_html(token, state, ctx))),
    }
}

fn inline_html(token: Inline<'_>, state: &mut PageState, ctx: &RenderContext) -> String {
    match token {
        Inline::Text(text) => escape(text),
        Inline::Mention(mention) => format!(
            r#"<a class="mention" href="{}" data-popup="{}">{}</a>"#,
            mention_url(&mention.key),
            popup_url(&mention.key),
            escape(mention.label)
        ),
        Inline::Timecode(timecode) => timecode_html(timecode, state),
        Inline::Issue(number) => {
            let title = ctx.issues.title(ctx.cache, number);
            let content = match (ctx.issues.issue_url(number), title) {
                (Some(url), Some(title)) => format!(
                    r#"Issue #{number}. <a class="issue" href="{}">{}</a>"#,
                    escape(&url),
                    escape(&title)
                ),
                (_, title) => format!("Issue {}", issue_link(number, title, ctx)),
            };
            sidenote(state.next_sidenote(), &content)
        }
        Inline::Sidenote(note) => {
            let number = state.next_sidenote();
            let content: String = markup::tokenize(note)
                .into_iter()
                .map(|inner| match inner {
                    Inline::Issue(number) => {
                        issue_link(number, ctx.issues.title(ctx.cache, number), ctx)
                    }
                    inner => inline_html(inner, state, ctx),
                })
                .collect();
            sidenote(number, &content)
        }
    }
}

/// Toggle label, checkbox and note body.
fn sidenote(number: u32, content: &str) -> String {
    let id = format!("sidenote-{number}");
    format!(
        concat!(
            r#"<label for="{id}" class="sidenote-toggle sidenote-number"></label>"#,
            r#"<input type="checkbox" id="{id}" class="sidenote-toggle">"#,
            r#"<span class="sidenote">{content}</span>"#
        ),
        id = id,
        content = content
    )
}

/// `#N`, linked when a repository is configured.
fn issue_link(number: u32, title: Option<String>, ctx: &RenderContext) -> String {
    match ctx.issues.issue_url(number) {
        Some(url) => format!(
            r#"<a class="issue" href="{}"{}>#{number}</a>"#,
            escape(&url),
            title
                .map(|title| format!(r#" title="{}""#, escape(&title)))
                .unwrap_or_default()
        ),
        None => format!(r#"<span class="issue">#{number}</span>"#),
    }
}

/// Only the first occurrence of a timecode on a page carries its anchor id.
fn timecode_html(timecode: Timecode, state: &mut PageState) -> String {
    let anchor = timecode.anchor();
    let id = if state.anchors.insert(anchor.clone()) {
        format!(r#" id="{anchor}""#)
    } else {
        String::new()
    };

    match state.source_url {
        Some(url) => format!(
            r#"<a class="timecode"{id} href="{}">[{timecode}]</a>"#,
            escape(&timecode.href(url))
        ),
        None => format!(r#"<span class="timecode"{id}>[{timecode}]</span>"#),
    }
}

/// Escape text for element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
