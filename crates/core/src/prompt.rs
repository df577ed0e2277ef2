//! Prompt assembly for book analysis.

use crate::types::{AnalysisRequest, BookRecord};

const TRUNCATION_MARKER: &str = "...";

const INSTRUCTION: &str = "Provide a detailed analysis of these books in relation to the question. \
Include relevant comparisons, themes, and insights.";

/// Cuts `description` to at most `budget` characters, marking the cut.
///
/// # Examples
///
/// ```
/// use bookwise_core::prompt::truncate_description;
///
/// assert_eq!(truncate_description("short", 10), "short");
/// assert_eq!(truncate_description("a long description", 6), "a long...");
/// ```
pub fn truncate_description(description: &str, budget: usize) -> String {
    let trimmed = description.trim();
    match trimmed.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", trimmed[..cut].trim_end()),
        None => trimmed.to_string(),
    }
}

/// Builds the single prompt submitted for an analysis request.
pub fn build_prompt(request: &AnalysisRequest, description_budget: usize) -> String {
    let mut prompt = String::from("Based on the following books information:\n\n");
    for book in &request.books {
        prompt.push_str(&render_book(book, description_budget));
        prompt.push('\n');
    }
    prompt.push_str(&format!("Question: {}\n\n", request.question.trim()));
    prompt.push_str(INSTRUCTION);
    prompt
}

fn render_book(book: &BookRecord, description_budget: usize) -> String {
    let authors = if book.authors.is_empty() {
        "Unknown".to_string()
    } else {
        book.authors.join(", ")
    };
    let mut out = format!("Book: {}\nAuthors: {authors}\n", book.title);
    if !book.categories.is_empty() {
        out.push_str(&format!("Categories: {}\n", book.categories.join(", ")));
    }
    out.push_str(&format!(
        "Description: {}\n",
        truncate_description(&book.description, description_budget)
    ));
    out
}
