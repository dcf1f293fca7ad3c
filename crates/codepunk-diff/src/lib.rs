//! Content hashing and unified-diff construction (C2/C3).

use sha2::{Digest, Sha256};

/// SHA-256 over the UTF-8 bytes of `content`, rendered as uppercase hex
/// (unlike the lowercase hex some git-plumbing-adjacent hashers in this
/// codebase use elsewhere).
pub fn content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    digest.iter().map(|b| format!("{b:02X}")).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal(usize, usize),
    Delete(usize),
    Insert(usize),
}

fn normalize_lines(content: &str) -> Vec<String> {
    content.replace("\r\n", "\n").split('\n').map(str::to_string).collect()
}

fn lcs_table(a: &[String], b: &[String]) -> Vec<Vec<u32>> {
    let (n, m) = (a.len(), b.len());
    let mut dp = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if a[i] == b[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }
    dp
}

fn backtrack(a: &[String], b: &[String], dp: &[Vec<u32>]) -> Vec<Op> {
    let (mut i, mut j) = (0usize, 0usize);
    let mut ops = Vec::new();
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            ops.push(Op::Equal(i, j));
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            ops.push(Op::Delete(i));
            i += 1;
        } else {
            ops.push(Op::Insert(j));
            j += 1;
        }
    }
    while i < a.len() {
        ops.push(Op::Delete(i));
        i += 1;
    }
    while j < b.len() {
        ops.push(Op::Insert(j));
        j += 1;
    }
    ops
}

/// One `@@ -aStart,aLen +bStart,bLen @@` region plus its `-`/`+` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub a_start: usize,
    pub a_len: usize,
    pub b_start: usize,
    pub b_len: usize,
    pub lines: Vec<String>,
}

fn build_hunks(a: &[String], b: &[String], ops: &[Op]) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut idx = 0;
    let (mut a_count, mut b_count) = (0usize, 0usize);

    while idx < ops.len() {
        match ops[idx] {
            Op::Equal(..) => {
                a_count += 1;
                b_count += 1;
                idx += 1;
                continue;
            }
            _ => {}
        }
        let block_start = idx;
        let mut end = idx;
        while end < ops.len() && !matches!(ops[end], Op::Equal(..)) {
            end += 1;
        }

        let mut lines = Vec::new();
        let (mut a_len, mut b_len) = (0usize, 0usize);
        for op in &ops[block_start..end] {
            match op {
                Op::Delete(ai) => {
                    a_len += 1;
                    lines.push(format!("-{}", a[*ai]));
                }
                Op::Insert(bi) => {
                    b_len += 1;
                    lines.push(format!("+{}", b[*bi]));
                }
                Op::Equal(..) => unreachable!(),
            }
        }

        hunks.push(Hunk {
            a_start: if a_len == 0 { a_count } else { a_count + 1 },
            a_len,
            b_start: if b_len == 0 { b_count } else { b_count + 1 },
            b_len,
            lines,
        });

        a_count += a_len;
        b_count += b_len;
        idx = end;
    }
    hunks
}

fn render(path: &str, hunks: &[Hunk]) -> String {
    let mut out = format!("--- a/{path}\n+++ b/{path}\n");
    for hunk in hunks {
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            hunk.a_start, hunk.a_len, hunk.b_start, hunk.b_len
        ));
        for line in &hunk.lines {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Line-based unified diff between `before` and `after`. Always returns a
/// non-empty string (at minimum the `---`/`+++` headers).
pub fn unified_diff(path: &str, before: &str, after: &str) -> String {
    let a = normalize_lines(before);
    let b = normalize_lines(after);
    let dp = lcs_table(&a, &b);
    let ops = backtrack(&a, &b, &dp);
    let hunks = build_hunks(&a, &b, &ops);
    render(path, &hunks)
}

/// Deletion marker diff: `+++ /dev/null` recognizable by the apply step.
pub fn deletion_diff(path: &str, before: &str) -> String {
    let a = normalize_lines(before);
    let mut out = format!("--- a/{path}\n+++ /dev/null\n");
    if !a.is_empty() {
        out.push_str(&format!("@@ -1,{} +0,0 @@\n", a.len()));
        for line in &a {
            out.push_str("-");
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Returns `true` if `diff` was produced by [`deletion_diff`].
pub fn is_deletion_marker(diff: &str) -> bool {
    diff.contains("+++ /dev/null")
}

/// Re-applies a diff produced by [`unified_diff`] onto `before`, returning
/// `after`. Used to test the round-trip property; understands this crate's
/// own hunk rendering, not arbitrary patch files.
pub fn apply_unified_diff(before: &str, diff: &str) -> Option<String> {
    let a = normalize_lines(before);
    let mut result: Vec<String> = Vec::new();
    let mut a_idx = 0usize;
    let mut lines = diff.lines().peekable();

    // Skip the --- / +++ header lines.
    while let Some(line) = lines.peek() {
        if line.starts_with("--- ") || line.starts_with("+++ ") {
            lines.next();
        } else {
            break;
        }
    }

    while let Some(line) = lines.next() {
        if let Some(header) = line.strip_prefix("@@ -") {
            let a_start: usize = header
                .split(',')
                .next()?
                .parse()
                .ok()?;
            // Copy unchanged lines up to this hunk's start (1-indexed; 0
            // for pure-insertion hunks means "insert before current pos").
            let target = if a_start == 0 { a_idx } else { a_start - 1 };
            while a_idx < target {
                result.push(a[a_idx].clone());
                a_idx += 1;
            }
            continue;
        }
        if let Some(removed) = line.strip_prefix('-') {
            if a.get(a_idx).map(|s| s.as_str()) != Some(removed) {
                return None;
            }
            a_idx += 1;
            continue;
        }
        if let Some(added) = line.strip_prefix('+') {
            result.push(added.to_string());
            continue;
        }
    }
    while a_idx < a.len() {
        result.push(a[a_idx].clone());
        a_idx += 1;
    }
    Some(result.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_uppercase() {
        let h1 = content_hash("hello world");
        let h2 = content_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1, h1.to_ascii_uppercase());
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn different_content_yields_different_hash() {
        assert_ne!(content_hash("a"), content_hash("b"));
    }

    #[test]
    fn known_sha256_vector() {
        // echo -n "" | sha256sum
        assert_eq!(
            content_hash(""),
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        );
    }

    #[test]
    fn diff_contains_headers_even_for_identical_content() {
        let diff = unified_diff("a.txt", "same", "same");
        assert!(diff.contains("--- a/a.txt"));
        assert!(diff.contains("+++ b/a.txt"));
        assert!(!diff.contains("@@"));
    }

    #[test]
    fn diff_round_trip_single_line_change() {
        let before = "Original";
        let after = "Changed";
        let diff = unified_diff("A.txt", before, after);
        let applied = apply_unified_diff(before, &diff).unwrap();
        assert_eq!(applied, after);
    }

    #[test]
    fn diff_round_trip_multiline_insert_and_delete() {
        let before = "one\ntwo\nthree\nfour";
        let after = "one\nTWO\nthree\nfour\nfive";
        let diff = unified_diff("f.txt", before, after);
        let applied = apply_unified_diff(before, &diff).unwrap();
        assert_eq!(applied, after);
    }

    #[test]
    fn deletion_diff_is_recognizable_marker() {
        let diff = deletion_diff("B.txt", "ToDelete");
        assert!(is_deletion_marker(&diff));
        assert!(!is_deletion_marker(&unified_diff("a", "x", "y")));
    }
}
