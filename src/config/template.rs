use crate::config::types::CommandTemplate;
use std::path::{Path, PathBuf};

/// Values substituted into a [`CommandTemplate`]
///
/// Unset values leave their placeholder untouched, which validation rules
/// out for the placeholders each collaborator requires.
#[derive(Debug, Default, Clone)]
pub struct TemplateVars<'a> {
    pub url: Option<&'a str>,
    pub html: Option<&'a Path>,
    pub base: Option<&'a Path>,
    pub output: Option<&'a Path>,
    pub media: Option<&'a str>,
    pub timeout_secs: Option<u64>,
    pub inputs: &'a [PathBuf],
}

impl CommandTemplate {
    /// Expands the argument templates
    ///
    /// Substitution is plain token replacement on our own fixed placeholder
    /// names; values are never interpreted.
    pub fn expand(&self, vars: &TemplateVars<'_>) -> Vec<String> {
        let mut out = Vec::with_capacity(self.args.len() + vars.inputs.len());

        for arg in &self.args {
            if arg == "{inputs}" {
                out.extend(vars.inputs.iter().map(|p| p.to_string_lossy().into_owned()));
                continue;
            }

            let mut value = arg.clone();
            if let Some(url) = vars.url {
                value = value.replace("{url}", url);
            }
            if let Some(html) = vars.html {
                value = value.replace("{html}", &html.to_string_lossy());
            }
            if let Some(base) = vars.base {
                value = value.replace("{base}", &base.to_string_lossy());
            }
            if let Some(output) = vars.output {
                value = value.replace("{output}", &output.to_string_lossy());
            }
            if let Some(media) = vars.media {
                value = value.replace("{media}", media);
            }
            if let Some(timeout) = vars.timeout_secs {
                value = value.replace("{timeout}", &timeout.to_string());
            }
            out.push(value);
        }

        out
    }

    /// Returns true if any argument mentions `placeholder`
    pub fn mentions(&self, placeholder: &str) -> bool {
        self.args.iter().any(|a| a.contains(placeholder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_render_template() {
        let template = CommandTemplate::new(
            "weasyprint",
            &["--base-url", "{base}", "--media-type", "{media}", "{html}", "{output}"],
        );
        let vars = TemplateVars {
            html: Some(Path::new("/w/pages/a.html")),
            base: Some(Path::new("/w/pages")),
            output: Some(Path::new("/w/rendered/a.pdf")),
            media: Some("print"),
            ..Default::default()
        };

        assert_eq!(
            template.expand(&vars),
            vec![
                "--base-url",
                "/w/pages",
                "--media-type",
                "print",
                "/w/pages/a.html",
                "/w/rendered/a.pdf"
            ]
        );
    }

    #[test]
    fn test_expand_inputs_into_separate_args() {
        let template = CommandTemplate::new("pdfunite", &["{inputs}", "{output}"]);
        let inputs = vec![PathBuf::from("a.pdf"), PathBuf::from("b c.pdf")];
        let vars = TemplateVars {
            output: Some(Path::new("out.pdf")),
            inputs: &inputs,
            ..Default::default()
        };

        assert_eq!(template.expand(&vars), vec!["a.pdf", "b c.pdf", "out.pdf"]);
    }

    #[test]
    fn test_expand_inline_placeholder() {
        let template = CommandTemplate::new("fetch", &["--url={url}", "--timeout={timeout}s"]);
        let vars = TemplateVars {
            url: Some("https://ex.com/a?b=$1"),
            timeout_secs: Some(90),
            ..Default::default()
        };

        assert_eq!(
            template.expand(&vars),
            vec!["--url=https://ex.com/a?b=$1", "--timeout=90s"]
        );
    }

    #[test]
    fn test_mentions() {
        let template = CommandTemplate::new("x", &["--out={output}"]);
        assert!(template.mentions("{output}"));
        assert!(!template.mentions("{html}"));
    }
}
