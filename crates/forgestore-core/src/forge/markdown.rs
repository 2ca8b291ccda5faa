//! Markdown post-processing for README and release bodies
//!
//! Repository markdown refers to images and files by paths relative to the
//! repo root; rendered outside the provider's web UI those links break. This
//! rewrites relative targets into absolute raw-content URLs rooted at the
//! repository's default branch. Pure string work, no network.

/// Rewrite relative link/image targets against an absolute raw-content base
///
/// `base_url` must end with `/` (e.g.
/// `https://raw.githubusercontent.com/owner/repo/main/`).
pub fn preprocess_markdown(markdown: &str, base_url: &str) -> String {
    let pass1 = rewrite_inline_targets(markdown, base_url);
    rewrite_html_src(&pass1, base_url)
}

/// Strip HTML collapsible wrappers and carriage returns from release bodies
pub fn clean_release_body(body: &str) -> String {
    body.replace("<details>", "")
        .replace("</details>", "")
        .replace("<summary>", "")
        .replace("</summary>", "")
        .replace("\r\n", "\n")
}

/// True when a markdown target needs the raw-content base prepended
fn is_relative(target: &str) -> bool {
    !(target.is_empty()
        || target.starts_with("http://")
        || target.starts_with("https://")
        || target.starts_with("//")
        || target.starts_with('#')
        || target.starts_with("mailto:")
        || target.starts_with("data:"))
}

fn absolutize(target: &str, base_url: &str) -> String {
    let path = target.trim_start_matches("./").trim_start_matches('/');
    format!("{}{}", base_url, path)
}

/// Rewrite `](target)` occurrences (covers both links and images)
fn rewrite_inline_targets(markdown: &str, base_url: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut rest = markdown;

    while let Some(open) = rest.find("](") {
        let target_start = open + 2;
        let Some(close) = rest[target_start..].find(')') else {
            break;
        };
        out.push_str(&rest[..target_start]);

        let target = &rest[target_start..target_start + close];
        // An optional `"title"` follows the path after a space
        let (path, title) = match target.find(' ') {
            Some(split) => (&target[..split], &target[split..]),
            None => (target, ""),
        };
        let path = path.trim();
        if is_relative(path) {
            out.push_str(&absolutize(path, base_url));
        } else {
            out.push_str(path);
        }
        out.push_str(title);
        out.push(')');

        rest = &rest[target_start + close + 1..];
    }
    out.push_str(rest);
    out
}

/// Rewrite `src="target"` occurrences in inline HTML
fn rewrite_html_src(markdown: &str, base_url: &str) -> String {
    let mut out = String::with_capacity(markdown.len());
    let mut rest = markdown;

    while let Some(open) = rest.find("src=\"") {
        let target_start = open + 5;
        let Some(close) = rest[target_start..].find('"') else {
            break;
        };
        out.push_str(&rest[..target_start]);

        let target = rest[target_start..target_start + close].trim();
        if is_relative(target) {
            out.push_str(&absolutize(target, base_url));
        } else {
            out.push_str(target);
        }
        out.push('"');

        rest = &rest[target_start + close + 1..];
    }
    out.push_str(rest);
    out
}
