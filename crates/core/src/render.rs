//! Rendering of highlighted code for terminals and as a standalone code card.

use std::fmt;

use crate::helpers::escape_html;
use crate::highlight::{split_lines, tokenize, Token, TokenKind};

/// A 24-bit colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Colours for each token kind plus the window background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: Rgb,
    pub foreground: Rgb,
    pub keyword: Rgb,
    pub function: Rgb,
    pub string: Rgb,
    pub number: Rgb,
    pub comment: Rgb,
    pub punctuation: Rgb,
    pub constant: Rgb,
}

impl Palette {
    /// The Breeze dark theme.
    pub const BREEZE: Palette = Palette {
        background: Rgb(0x1e, 0x1e, 0x1e),
        foreground: Rgb(0xff, 0xff, 0xff),
        keyword: Rgb(0x65, 0x99, 0xff),
        function: Rgb(0xf8, 0x51, 0x8d),
        string: Rgb(0xe9, 0xae, 0xfe),
        number: Rgb(0x55, 0xe7, 0xb2),
        comment: Rgb(0x8a, 0x75, 0x7d),
        punctuation: Rgb(0xf8, 0x51, 0x8d),
        constant: Rgb(0x49, 0xe8, 0xf2),
    };

    pub fn color(&self, kind: TokenKind) -> Rgb {
        match kind {
            TokenKind::Text | TokenKind::Foreground => self.foreground,
            TokenKind::Comment => self.comment,
            TokenKind::String => self.string,
            TokenKind::Number => self.number,
            TokenKind::Keyword => self.keyword,
            TokenKind::Punctuation => self.punctuation,
            TokenKind::Function => self.function,
            TokenKind::Constant => self.constant,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::BREEZE
    }
}

/// Options for [`render_ansi`].
#[derive(Debug, Clone, Default)]
pub struct AnsiOptions {
    pub palette: Palette,
    /// Prefix every line with its 1-based number.
    pub gutter: bool,
    /// 1-based line numbers to mark with `+` in the gutter.
    pub emphasized: Vec<usize>,
}

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

/// Render `source` with 24-bit ANSI colour escapes, one output line per source line.
pub fn render_ansi(source: &str, options: &AnsiOptions) -> String {
    let tokens = tokenize(source);
    let lines = split_lines(&tokens);
    let width = lines.len().to_string().len();

    let mut out = String::with_capacity(source.len() * 2);
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let number = index + 1;
        if options.gutter {
            let marker = if options.emphasized.contains(&number) { '+' } else { ' ' };
            out.push_str(&format!("{DIM}{number:>width$} {marker}{RESET} "));
        }
        for token in line {
            let Rgb(r, g, b) = options.palette.color(token.kind);
            out.push_str(&format!("\x1b[38;2;{r};{g};{b}m{}", token.text));
        }
        if !line.is_empty() {
            out.push_str(RESET);
        }
    }
    out
}

/// A window-style HTML card showing highlighted code.
#[derive(Debug, Clone, Default)]
pub struct CodeCard {
    pub palette: Palette,
    /// Shown in the window's title bar.
    pub title: Option<String>,
    /// 1-based line numbers to highlight.
    pub emphasized: Vec<usize>,
}

impl CodeCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_emphasized(mut self, lines: Vec<usize>) -> Self {
        self.emphasized = lines;
        self
    }

    fn push_span(&self, out: &mut String, token: &Token<'_>) {
        out.push_str(&format!(
            "<span class=\"tok-{}\" style=\"color:{}\">{}</span>",
            token.kind.as_str(),
            self.palette.color(token.kind),
            escape_html(token.text)
        ));
    }

    /// The code lines only, as a `<div class="code">` fragment.
    pub fn body_html(&self, source: &str) -> String {
        let tokens = tokenize(source);
        let mut out = String::from("<div class=\"code\">\n");
        for (index, line) in split_lines(&tokens).iter().enumerate() {
            let number = index + 1;
            let class = if self.emphasized.contains(&number) { "line emphasized" } else { "line" };
            out.push_str(&format!("<div class=\"{class}\"><span class=\"gutter\">{number}</span><span class=\"src\">"));
            for token in line {
                self.push_span(&mut out, token);
            }
            out.push_str("</span></div>\n");
        }
        out.push_str("</div>");
        out
    }

    /// A complete HTML document suitable for screenshotting.
    pub fn to_html(&self, source: &str) -> String {
        let title = self.title.as_deref().map(escape_html).unwrap_or_default();
        let background = self.palette.background;
        let foreground = self.palette.foreground;
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ margin: 0; padding: 32px; background: transparent; }}
.window {{ display: inline-block; min-width: 480px; border-radius: 12px; overflow: hidden; background: #0e1016; box-shadow: 0 20px 50px rgba(0,0,0,0.5); }}
.chrome {{ display: flex; align-items: center; gap: 8px; padding: 12px 16px; background: rgba(255,255,255,0.05); }}
.dot {{ width: 12px; height: 12px; border-radius: 50%; }}
.title {{ margin-left: 12px; color: #9ca3af; font: 13px sans-serif; }}
.code {{ padding: 16px; background: {background}; color: {foreground}; font: 14px/24px ui-monospace, Menlo, Consolas, monospace; }}
.line {{ display: flex; min-height: 24px; }}
.line.emphasized {{ background: rgba(255,255,255,0.08); }}
.gutter {{ width: 3ch; padding-right: 16px; margin-right: 16px; text-align: right; color: #4b5563; border-right: 1px solid rgba(55,65,81,0.5); user-select: none; }}
.src {{ white-space: pre; }}
</style>
</head>
<body>
<div class="window">
<div class="chrome"><span class="dot" style="background:#ff5f56"></span><span class="dot" style="background:#ffbd2e"></span><span class="dot" style="background:#27c93f"></span><span class="title">{title}</span></div>
{body}
</div>
</body>
</html>
"#,
            body = self.body_html(source),
        )
    }
}
