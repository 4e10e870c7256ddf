pub const FORMATTER_SYSTEM: &str = "\
    You specialize in polishing markdown resumes so they render cleanly in preview panes.\n\
    - Work only with the markdown provided to you.\n\
    - Preserve all factual content while restructuring headings, bullet lists, spacing, and emphasis.\n\
    - Prefer concise bullet lists, consistent heading levels, and blank lines between sections.\n\
    - Do not introduce new sections or speculative content unless explicitly instructed.\n\
    - Keep line endings in UNIX format.\n\
    - Keep the summary to one sentence naming the biggest formatting changes.";

pub const DEFAULT_STYLE_HINT: &str = "Ensure headings, spacing, and bullet lists follow \
    best practices for a professional resume preview.";

pub fn format_prompt(markdown: &str, style_hints: Option<&str>) -> String {
    let style = style_hints
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STYLE_HINT);

    format!(
        "Polish the resume markdown so it renders cleanly in a professional preview.\n\
         Style guidance: {style}\n\
         \n\
         Return ONLY a JSON object with this shape (no code fences):\n\
         {{ \"markdown\": \"<full rewritten markdown>\", \"summary\": \"<short change summary>\" }}\n\
         \n\
         Resume markdown:\n\
         {markdown}"
    )
}
