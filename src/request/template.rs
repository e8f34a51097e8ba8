use std::collections::BTreeMap;

use reqwest::Method;

/// An HTTP request skeleton. URL, header values, and body may contain
/// `${name}` placeholders.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    pub name: String,
    pub weight: u32,
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// Replace every `${name}` occurrence left to right. Placeholders with
/// no matching parameter stay literal.
#[must_use]
pub fn render_template(input: &str, params: &BTreeMap<String, String>) -> String {
    let mut rest = input;
    let mut output = String::with_capacity(input.len());

    loop {
        let Some(start) = rest.find("${") else {
            output.push_str(rest);
            break;
        };
        let (before, after_start) = rest.split_at(start);
        output.push_str(before);
        let Some(after) = after_start.strip_prefix("${") else {
            output.push_str(after_start);
            break;
        };
        let Some(end) = after.find('}') else {
            output.push_str("${");
            output.push_str(after);
            break;
        };
        let (key, after_end) = after.split_at(end);
        match params.get(key) {
            Some(value) => output.push_str(value),
            None => {
                output.push_str("${");
                output.push_str(key);
                output.push('}');
            }
        }
        rest = match after_end.strip_prefix('}') {
            Some(remaining) => remaining,
            None => {
                output.push_str(after_end);
                break;
            }
        };
    }

    output
}
