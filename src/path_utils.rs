use std::collections::HashMap;

/// Matches a request path against a pattern such as `/webhook/{secret}`,
/// returning the captured variables. Query strings are not matched; callers
/// pass `Uri::path()`.
pub fn match_path(path: &str, pat: &str) -> Option<HashMap<String, String>> {
    let path = path.split('/').collect::<Vec<&str>>();
    let pat = pat.split('/').collect::<Vec<&str>>();
    if path.len() != pat.len() {
        return None;
    }

    let mut vars = HashMap::new();
    for (path, pat) in path.iter().zip(pat.iter()) {
        if let Some(name) = variable(pat) {
            if path.is_empty() {
                return None;
            }
            vars.insert(name.to_string(), path.to_string());
        } else if path != pat {
            return None;
        }
    }
    Some(vars)
}

fn variable(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}
