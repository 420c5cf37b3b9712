use std::fmt::Write;

use threadline_client::Forest;
use threadline_types::{Comment, UserId};

const INDENT: &str = "    ";

/// Indented text view of the forest. Comments owned by `viewer` are marked
/// as deletable.
pub fn render_forest(forest: &Forest, viewer: Option<UserId>) -> String {
    if forest.is_empty() {
        return "No comments yet.\n".to_string();
    }

    let mut out = String::new();
    for root in forest.roots() {
        render_comment(&mut out, root, viewer, 0);
    }
    out
}

fn render_comment(out: &mut String, comment: &Comment, viewer: Option<UserId>, depth: usize) {
    let indent = INDENT.repeat(depth);
    let owned = viewer.is_some_and(|id| comment.is_owned_by(id));
    let when = comment
        .posted_at()
        .map(|t| format!(" · {}", t.format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();

    let _ = writeln!(
        out,
        "{indent}#{} {}{}{}",
        comment.id,
        comment.author_name,
        when,
        if owned { " (yours)" } else { "" }
    );
    let _ = writeln!(out, "{indent}  {}", comment.text);

    for reply in &comment.replies {
        render_comment(out, reply, viewer, depth + 1);
    }
}
