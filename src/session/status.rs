//! Worktree status parsing (`git status --porcelain=v2`).

/// One changed, untracked, or unmerged path in a worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Two-letter index/worktree code (`M.`, `.D`, `??`, ...).
    pub code: String,
    /// Path relative to the worktree root.
    pub path: String,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.code == "??"
    }
}

/// Parse porcelain v2 output, skipping header and ignored lines.
pub fn parse_porcelain_v2(output: &str) -> Vec<StatusEntry> {
    output.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<StatusEntry> {
    let (kind, rest) = line.split_once(' ')?;
    match kind {
        // 1 <XY> <sub> <mH> <mI> <mW> <hH> <hI> <path>
        "1" => entry_after_fields(rest, 7),
        // 2 <XY> <sub> <mH> <mI> <mW> <hH> <hI> <X><score> <path>\t<origPath>
        "2" => entry_after_fields(rest, 8).map(|mut entry| {
            if let Some((path, _orig)) = entry.path.split_once('\t') {
                entry.path = path.to_string();
            }
            entry
        }),
        // u <XY> <sub> <m1> <m2> <m3> <mW> <h1> <h2> <h3> <path>
        "u" => entry_after_fields(rest, 9),
        "?" => Some(StatusEntry {
            code: "??".to_string(),
            path: rest.to_string(),
        }),
        _ => None,
    }
}

/// `rest` starts with the XY code; the path follows `fields` space-separated
/// fields, XY included.
fn entry_after_fields(rest: &str, fields: usize) -> Option<StatusEntry> {
    let mut parts = rest.splitn(fields + 1, ' ');
    let code = parts.next()?.to_string();
    let path = parts.nth(fields - 1)?.to_string();
    Some(StatusEntry { code, path })
}
