//! Lexical structure scanner
//!
//! Splits a source file into code blocks (functions, classes, or a single
//! module block when nothing else is found) and measures each one. This is
//! deliberately rule-based: no parser per language, just line patterns and
//! delimiter tracking that are good enough for routing and metrics.

use super::language::{BlockStyle, Language};
use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Function,
    Class,
    Module,
}

/// One block of the file IR
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub kind: BlockKind,
    pub name: String,
    /// 1-based, inclusive
    pub start_line: usize,
    pub end_line: usize,
    /// Decision points + 1
    pub complexity: u32,
    /// Control nesting inside the block body
    pub nesting_depth: u32,
    pub recursive: bool,
}

impl CodeBlock {
    pub fn length(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

/// Everything the scanner learned about a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStructure {
    pub blocks: Vec<CodeBlock>,
    pub code_lines: usize,
    pub comment_lines: usize,
    pub fan_out: usize,
    pub max_nesting_depth: u32,
}

impl FileStructure {
    pub fn functions(&self) -> impl Iterator<Item = &CodeBlock> {
        self.blocks.iter().filter(|b| b.kind == BlockKind::Function)
    }

    pub fn classes(&self) -> impl Iterator<Item = &CodeBlock> {
        self.blocks.iter().filter(|b| b.kind == BlockKind::Class)
    }
}

lazy_static! {
    static ref PY_DEF: Regex = Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap();
    static ref PY_CLASS: Regex = Regex::new(r"^\s*class\s+([A-Za-z_]\w*)").unwrap();
    static ref RUBY_DEF: Regex = Regex::new(r"^\s*def\s+(?:self\.)?([A-Za-z_][\w?!]*)").unwrap();
    static ref RUBY_CLASS: Regex = Regex::new(r"^\s*(?:class|module)\s+([A-Z]\w*)").unwrap();
    static ref RUBY_OPENER: Regex = Regex::new(
        r"^\s*(?:def|class|module|if|unless|while|until|case|begin|for)\b|\bdo\s*(?:\|[^|]*\|)?\s*$"
    )
    .unwrap();
    static ref RUBY_END: Regex = Regex::new(r"^\s*end\b").unwrap();
    static ref BRACE_CLASS: Regex =
        Regex::new(r"\b(?:class|struct|interface|trait|impl|enum)\s+([A-Za-z_]\w*)").unwrap();
    static ref BRACE_FN: Vec<Regex> = vec![
        Regex::new(r"\bfunction\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(").unwrap(),
        Regex::new(r"\bfn\s+([A-Za-z_]\w*)").unwrap(),
        Regex::new(r"\bfunc\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)\s*[(<]").unwrap(),
        Regex::new(r"\bfun\s+(?:<[^>]*>\s*)?(?:[\w.]+\.)?([A-Za-z_]\w*)\s*\(").unwrap(),
        Regex::new(
            r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:function\b|\([^)]*\)\s*(?::\s*[^=]+)?=>|[A-Za-z_$][\w$]*\s*=>)"
        )
        .unwrap(),
        Regex::new(
            r"^\s*(?:(?:public|private|protected|internal|static|final|synchronized|abstract|virtual|override|async|inline|extern|unsafe|export|default)\s+)*[A-Za-z_][\w<>\[\],.*&:?\s]*?\s+\**([A-Za-z_]\w*)\s*\([^;]*$"
        )
        .unwrap(),
        Regex::new(
            r"^\s*(?:(?:public|private|protected|static|async|readonly|override|get|set)\s+)*\*?([A-Za-z_$][\w$]*)\s*\([^;]*\)\s*(?::\s*[^{;]+)?\{\s*$"
        )
        .unwrap(),
    ];
    static ref DECISION: Regex =
        Regex::new(r"\b(?:if|elif|for|foreach|while|case|catch|except|when|unless|until)\b|&&|\|\|")
            .unwrap();
    static ref WORD_LOGIC_OP: Regex = Regex::new(r"\b(?:and|or)\b").unwrap();
    static ref IMPORT: Regex = Regex::new(
        r#"^\s*(?:import\s|from\s+\S+\s+import\s|#include\s|using\s+[\w.]+\s*;|use\s+[\w:]+|require(?:_once)?[\s(]+['"])|\brequire\(\s*['"]"#
    )
    .unwrap();
}

/// Words that look like a callable name to the patterns but never are
const NOT_A_NAME: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "else", "new", "throw", "await", "yield",
    "case", "do", "try", "sizeof", "typeof", "with", "elif", "except", "print", "super", "this",
    "function", "match", "loop", "defer", "go", "delete",
];

/// Statement keywords that rule out a declaration when they lead the line
const STATEMENT_LEADS: &[&str] = &[
    "return", "new", "throw", "await", "yield", "else", "case", "print", "echo", "delete", "go",
    "defer", "raise", "assert",
];

/// Scan `content` into blocks and line metrics
pub fn scan(language: Language, content: &str) -> FileStructure {
    let lines: Vec<&str> = content.lines().collect();
    let comment_mask = classify_comments(language, &lines);

    let comment_lines = comment_mask.iter().filter(|c| **c).count();
    let code_lines = lines
        .iter()
        .zip(&comment_mask)
        .filter(|(line, is_comment)| !**is_comment && !line.trim().is_empty())
        .count();
    let fan_out = lines
        .iter()
        .zip(&comment_mask)
        .filter(|(line, is_comment)| !**is_comment && IMPORT.is_match(line))
        .count();

    let mut blocks = match language.block_style() {
        BlockStyle::Braces => scan_brace_blocks(language, &lines),
        BlockStyle::Indentation => scan_indented_blocks(&lines),
        BlockStyle::Keywords => scan_keyword_blocks(&lines),
    };

    for block in &mut blocks {
        let body = &lines[block.start_line - 1..block.end_line];
        let mask = &comment_mask[block.start_line - 1..block.end_line];
        block.complexity = 1 + count_decisions(language, body, mask);
        if block.kind == BlockKind::Function {
            block.recursive = calls_itself(&block.name, &body[1..]);
        }
    }

    if blocks.is_empty() && code_lines > 0 {
        let first = comment_mask
            .iter()
            .zip(&lines)
            .position(|(c, l)| !*c && !l.trim().is_empty())
            .unwrap_or(0);
        let last = comment_mask
            .iter()
            .zip(&lines)
            .rposition(|(c, l)| !*c && !l.trim().is_empty())
            .unwrap_or(first);
        blocks.push(CodeBlock {
            kind: BlockKind::Module,
            name: "module".to_string(),
            start_line: first + 1,
            end_line: last + 1,
            complexity: 1 + count_decisions(language, &lines, &comment_mask),
            nesting_depth: whole_file_depth(language, &lines),
            recursive: false,
        });
    }

    blocks.sort_by_key(|b| (b.start_line, b.end_line));

    let max_nesting_depth = blocks
        .iter()
        .filter(|b| b.kind != BlockKind::Class)
        .map(|b| b.nesting_depth)
        .max()
        .unwrap_or(0);

    FileStructure {
        blocks,
        code_lines,
        comment_lines,
        fan_out,
        max_nesting_depth,
    }
}

fn classify_comments(language: Language, lines: &[&str]) -> Vec<bool> {
    let prefixes = language.comment_prefixes();
    let mut in_block = false;
    let mut in_docstring = false;

    lines
        .iter()
        .map(|line| {
            let trimmed = line.trim();
            if in_block {
                if trimmed.contains("*/") {
                    in_block = false;
                }
                return true;
            }
            if in_docstring {
                if trimmed.contains("\"\"\"") || trimmed.contains("'''") {
                    in_docstring = false;
                }
                return true;
            }
            if trimmed.is_empty() {
                return false;
            }
            if language.block_style() == BlockStyle::Indentation
                && (trimmed.starts_with("\"\"\"") || trimmed.starts_with("'''"))
            {
                let delim = &trimmed[..3];
                if trimmed.matches(delim).count() == 1 {
                    in_docstring = true;
                }
                return true;
            }
            if trimmed.starts_with("/*") && language.block_style() == BlockStyle::Braces {
                if !trimmed[2..].contains("*/") {
                    in_block = true;
                }
                return true;
            }
            prefixes.iter().any(|p| trimmed.starts_with(p))
        })
        .collect()
}

fn count_decisions(language: Language, lines: &[&str], comment_mask: &[bool]) -> u32 {
    let word_ops = language.block_style() != BlockStyle::Braces;
    lines
        .iter()
        .zip(comment_mask)
        .filter(|(_, is_comment)| !**is_comment)
        .map(|(line, _)| {
            let mut count = DECISION.find_iter(line).count();
            if word_ops {
                count += WORD_LOGIC_OP.find_iter(line).count();
            }
            count as u32
        })
        .sum()
}

fn calls_itself(name: &str, body: &[&str]) -> bool {
    let pattern = format!(r"\b{}\s*\(", regex::escape(name));
    match Regex::new(&pattern) {
        Ok(re) => body.iter().any(|line| re.is_match(line)),
        Err(_) => false,
    }
}

fn declared_name<'a>(line: &'a str, re: &Regex) -> Option<&'a str> {
    let name = re.captures(line)?.get(1)?.as_str();
    if NOT_A_NAME.contains(&name) {
        return None;
    }
    let lead = line.split_whitespace().next().unwrap_or("");
    if STATEMENT_LEADS.contains(&lead) {
        return None;
    }
    Some(name)
}

fn scan_brace_blocks(language: Language, lines: &[&str]) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let (kind, name) = if let Some(name) = declared_name(line, &BRACE_CLASS) {
            (BlockKind::Class, name)
        } else if let Some(name) = BRACE_FN.iter().find_map(|re| declared_name(line, re)) {
            (BlockKind::Function, name)
        } else {
            continue;
        };

        if let Some((end, depth)) = brace_extent(language, lines, idx) {
            blocks.push(CodeBlock {
                kind,
                name: name.to_string(),
                start_line: idx + 1,
                end_line: end + 1,
                complexity: 1,
                nesting_depth: depth.saturating_sub(1),
                recursive: false,
            });
        }
    }
    blocks
}

/// Follow braces from a declaration line. Returns the closing line index
/// and the maximum brace depth reached, or `None` for bodiless declarations.
fn brace_extent(language: Language, lines: &[&str], start: usize) -> Option<(usize, u32)> {
    let mut depth: u32 = 0;
    let mut max_depth: u32 = 0;
    let mut opened = false;
    let mut parens: i32 = 0;
    let mut lexer = LineLexer::new(language);

    for (idx, line) in lines.iter().enumerate().skip(start) {
        for ch in lexer.code_chars(line) {
            match ch {
                '(' => parens += 1,
                ')' => parens -= 1,
                ';' if !opened && parens <= 0 => return None,
                '{' => {
                    opened = true;
                    depth += 1;
                    max_depth = max_depth.max(depth);
                }
                '}' if opened => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some((idx, max_depth));
                    }
                }
                _ => {}
            }
        }
        if !opened {
            let trimmed = line.trim_end();
            let continues = parens > 0 || trimmed.ends_with(')') || trimmed.ends_with(',');
            if !continues || idx >= start + 4 {
                return None;
            }
        }
    }

    opened.then(|| (lines.len().saturating_sub(1), max_depth))
}

fn whole_file_depth(language: Language, lines: &[&str]) -> u32 {
    match language.block_style() {
        BlockStyle::Braces => {
            let mut lexer = LineLexer::new(language);
            let mut depth: u32 = 0;
            let mut max_depth: u32 = 0;
            for line in lines {
                for ch in lexer.code_chars(line) {
                    match ch {
                        '{' => {
                            depth += 1;
                            max_depth = max_depth.max(depth);
                        }
                        '}' => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                }
            }
            max_depth
        }
        BlockStyle::Indentation => indent_levels(lines, 0),
        BlockStyle::Keywords => keyword_depth(lines).1,
    }
}

fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Distinct indentation levels deeper than `base`, minus one for the body
fn indent_levels(lines: &[&str], base: usize) -> u32 {
    let mut levels: Vec<usize> = lines
        .iter()
        .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))
        .map(|l| indent_of(l))
        .filter(|indent| *indent > base)
        .collect();
    levels.sort_unstable();
    levels.dedup();
    levels.len().saturating_sub(1) as u32
}

fn scan_indented_blocks(lines: &[&str]) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let (kind, name) = if let Some(caps) = PY_DEF.captures(line) {
            (BlockKind::Function, caps[1].to_string())
        } else if let Some(caps) = PY_CLASS.captures(line) {
            (BlockKind::Class, caps[1].to_string())
        } else {
            continue;
        };

        let base = indent_of(line);
        let mut end = idx;
        for (j, next) in lines.iter().enumerate().skip(idx + 1) {
            if next.trim().is_empty() {
                continue;
            }
            if indent_of(next) <= base {
                break;
            }
            end = j;
        }

        let nesting_depth = if end > idx {
            indent_levels(&lines[idx + 1..=end], base)
        } else {
            0
        };

        blocks.push(CodeBlock {
            kind,
            name,
            start_line: idx + 1,
            end_line: end + 1,
            complexity: 1,
            nesting_depth,
            recursive: false,
        });
    }
    blocks
}

/// Returns (closing line index, max depth) for keyword-delimited code
fn keyword_depth(lines: &[&str]) -> (Option<usize>, u32) {
    let mut depth: u32 = 0;
    let mut max_depth: u32 = 0;
    for (idx, line) in lines.iter().enumerate() {
        if RUBY_OPENER.is_match(line) {
            depth += 1;
            max_depth = max_depth.max(depth);
        }
        if RUBY_END.is_match(line) {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return (Some(idx), max_depth);
            }
        }
    }
    (None, max_depth)
}

fn scan_keyword_blocks(lines: &[&str]) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let (kind, name) = if let Some(caps) = RUBY_DEF.captures(line) {
            (BlockKind::Function, caps[1].to_string())
        } else if let Some(caps) = RUBY_CLASS.captures(line) {
            (BlockKind::Class, caps[1].to_string())
        } else {
            continue;
        };

        let (end, depth) = keyword_depth(&lines[idx..]);
        let end = end.map(|e| idx + e).unwrap_or(lines.len() - 1);
        blocks.push(CodeBlock {
            kind,
            name,
            start_line: idx + 1,
            end_line: end + 1,
            complexity: 1,
            nesting_depth: depth.saturating_sub(1),
            recursive: false,
        });
    }
    blocks
}

/// Yields the structural characters of a line, skipping string literals
/// and trailing line comments. Block comments are tracked across lines.
struct LineLexer {
    single_quote_strings: bool,
    in_block_comment: bool,
}

impl LineLexer {
    fn new(language: Language) -> Self {
        Self {
            // Rust lifetimes and generics would unbalance '...' tracking
            single_quote_strings: !matches!(language, Language::Rust),
            in_block_comment: false,
        }
    }

    fn code_chars(&mut self, line: &str) -> Vec<char> {
        let chars: Vec<char> = line.chars().collect();
        let mut out = Vec::with_capacity(chars.len());
        let mut quote: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];
            let next = chars.get(i + 1).copied();

            if self.in_block_comment {
                if ch == '*' && next == Some('/') {
                    self.in_block_comment = false;
                    i += 1;
                }
            } else if let Some(q) = quote {
                if ch == '\\' {
                    i += 1;
                } else if ch == q {
                    quote = None;
                }
            } else if ch == '/' && next == Some('/') {
                break;
            } else if ch == '/' && next == Some('*') {
                self.in_block_comment = true;
                i += 1;
            } else if ch == '"' || ch == '`' || (ch == '\'' && self.single_quote_strings) {
                quote = Some(ch);
            } else {
                out.push(ch);
            }
            i += 1;
        }

        out
    }
}
