/// Approximate regex synthesis from a rule's content chain
use super::rule::{Content, Rule};
use crate::error::Result;
use regex::bytes::{Regex, RegexBuilder};

impl Rule {
    /// Build a regular expression approximating the rule's contents.
    ///
    /// This is a best-effort textual approximation, not a faithful matcher:
    /// negation, buffers, `nocase`, `offset` and `depth` are ignored, and CR/LF
    /// bytes are loosened to a literal dot. Contents are chained in rule order
    /// with gaps taken from each content's `distance`/`within` modifiers.
    /// A rule without contents yields an empty expression.
    pub fn re(&self) -> String {
        let mut re = String::new();

        for (i, content) in self.contents.iter().enumerate() {
            if i == 0 {
                // The chain may start anywhere in the stream
                re.push_str(".*");
            } else {
                re.push_str(&gap(content));
            }
            re.push_str(&content.to_regex());
        }

        re
    }

    /// Compile `re()` for matching raw payload bytes
    pub fn compile_re(&self) -> Result<Regex> {
        Ok(RegexBuilder::new(&self.re()).unicode(false).build()?)
    }
}

/// Gap before a content, from its distance (minimum) and within (maximum)
fn gap(content: &Content) -> String {
    // Negative distances and inverted bounds are clamped to keep the repetition valid
    match (content.distance(), content.within()) {
        (None, None) => String::new(),
        (None, Some(within)) => format!(".{{0,{}}}", within.max(0)),
        (Some(distance), None) => format!(".{{{},}}", distance.max(0)),
        (Some(distance), Some(within)) => {
            let min = distance.max(0);
            format!(".{{{},{}}}", min, within.max(min))
        }
    }
}
