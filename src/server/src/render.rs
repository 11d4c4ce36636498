//! HTML and JSON rendering of listings.

use std::fmt::Write as _;

use isoshelf_core::{BackTarget, NodeKind, VirtualNode, VirtualPath};
use isoshelf_runtime::Listing;
use serde::Serialize;

use crate::urlpath::{encode_path, encode_segment};

/// Response flavor of a listing route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    Json,
}

impl Format {
    /// Route segment selecting this format.
    pub fn segment(&self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Json => "json",
        }
    }
}

/// Builds client-facing URLs under the configured prefix.
#[derive(Debug, Clone)]
pub struct Links {
    prefix: String,
}

impl Links {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Top-level image listing.
    pub fn inventory(&self, format: Format) -> String {
        format!("{}/{}/", self.prefix, format.segment())
    }

    /// One directory inside an image.
    pub fn directory(&self, format: Format, image: &str, dir: &VirtualPath) -> String {
        format!(
            "{}/{}/{}/{}",
            self.prefix,
            format.segment(),
            encode_segment(image),
            encode_path(dir.segments())
        )
    }

    /// Download of one member.
    pub fn download(&self, image: &str, path: &VirtualPath) -> String {
        format!(
            "{}/download/{}/{}",
            self.prefix,
            encode_segment(image),
            encode_path(path.segments())
        )
    }

    /// Download of a whole image file.
    pub fn image_download(&self, file_name: &str) -> String {
        format!("{}/download/{}", self.prefix, encode_segment(file_name))
    }

    /// Navigation target of a node listed inside `image`.
    ///
    /// IMAGE nodes carry their own name and ignore `image`.
    pub fn target(&self, format: Format, image: &str, node: &VirtualNode) -> String {
        match node {
            VirtualNode::Back {
                target: BackTarget::Inventory,
            } => self.inventory(format),
            VirtualNode::Back {
                target: BackTarget::Parent(parent),
            } => self.directory(format, image, parent),
            VirtualNode::Dir { path, .. } => self.directory(format, image, path),
            VirtualNode::File { path, .. } => self.download(image, path),
            VirtualNode::Image { name, .. } => {
                self.directory(format, name, &VirtualPath::root())
            }
        }
    }
}

/// One machine-readable listing item.
#[derive(Debug, Serialize)]
pub struct JsonItem<'a> {
    pub path: String,
    pub name: &'a str,
    pub kind: NodeKind,
}

/// JSON items for `nodes` listed inside `image`.
pub fn json_items<'a>(links: &Links, image: &str, nodes: &'a [VirtualNode]) -> Vec<JsonItem<'a>> {
    nodes
        .iter()
        .map(|node| JsonItem {
            path: links.target(Format::Json, image, node),
            name: node.name(),
            kind: node.kind(),
        })
        .collect()
}

/// HTML page listing all images.
pub fn inventory_html(links: &Links, nodes: &[VirtualNode]) -> String {
    let mut items = String::new();
    for node in nodes {
        let VirtualNode::Image { name, file_name } = node else {
            continue;
        };
        let _ = writeln!(
            items,
            "<li class=\"image\"><a href=\"{}\">{}</a> <a class=\"download\" href=\"{}\">[download]</a></li>",
            escape_html(&links.target(Format::Html, "", node)),
            escape_html(name),
            escape_html(&links.image_download(file_name)),
        );
    }
    page("Images", &items)
}

/// HTML page for one directory.
pub fn listing_html(links: &Links, listing: &Listing) -> String {
    let image = listing.image.name.as_str();
    let mut items = String::new();
    for node in &listing.nodes {
        let href = escape_html(&links.target(Format::Html, image, node));
        let line = match node {
            VirtualNode::Back { .. } => format!("<li class=\"back\"><a href=\"{}\">..</a></li>", href),
            VirtualNode::Dir { name, .. } => format!(
                "<li class=\"dir\"><a href=\"{}\">{}/</a></li>",
                href,
                escape_html(name)
            ),
            VirtualNode::File { name, size, .. } => format!(
                "<li class=\"file\"><a href=\"{}\">{}</a> <span class=\"size\">{}</span></li>",
                href,
                escape_html(name),
                format_size(*size)
            ),
            VirtualNode::Image { name, .. } => format!(
                "<li class=\"image\"><a href=\"{}\">{}</a></li>",
                href,
                escape_html(name)
            ),
        };
        items.push_str(&line);
        items.push('\n');
    }
    page(&format!("{}:{}", image, listing.dir), &items)
}

fn page(title: &str, items: &str) -> String {
    let title = escape_html(title);
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n<ul>\n{items}</ul>\n</body>\n</html>\n"
    )
}

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
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

/// `Content-Disposition` value for an attachment named `name`.
///
/// The quoted form keeps printable ASCII only; `filename*` carries the
/// exact UTF-8 name.
pub fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        encode_segment(name)
    )
}

/// Human-readable byte count.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
