//! Prompt rendering for blog generation.

use crate::models::BlogRequest;

/// Tag list asked of the provider. Downstream renderers depend on this exact set.
pub const HTML_FORMAT_INSTRUCTIONS: &str = "Please format the output using HTML tags, including \
headings (e.g. <h1>, <h2>, <h3>, <h4>, <h5>, <h6>), sections, paragraphs (<p>), bullet points \
(<ul> and <li>), ordered lists (<ol>), blockquotes (<blockquote>), preformatted text and code \
snippets (<pre> and <code>), hyperlinks (<a>), images (<img>), bold text (<strong> or <b>), \
italic text (<em> or <i>), underlined text (<u>), strikethrough text (<s> or <del>), subscript \
text (<sub>), superscript text (<sup>), horizontal rules (<hr>), and tables (<table>, <thead>, \
<tbody>, <tfoot>, <tr>, <th>, <td>).";

/// Render the single prompt sent to the provider.
pub fn render_prompt(request: &BlogRequest) -> String {
    format!(
        "Write a {} blog post targeted at {} on the topic of {}. The post should be {} words \
         long, use a {} tone, and include the following points: {}. {}",
        request.content_type,
        request.target_audience,
        request.keywords.join(", "),
        request.blog_length,
        request.tone,
        request.additional_instructions.join(", "),
        HTML_FORMAT_INSTRUCTIONS,
    )
}
