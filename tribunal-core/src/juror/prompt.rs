//! Prompt text sent to LLM-backed jurors.

use crate::config::CriterionConfig;
use crate::types::ResponseCandidate;

/// System prompt for jurors that do not supply their own.
pub const DEFAULT_JUROR_SYSTEM_PROMPT: &str = "You are an expert evaluator tasked with judging the quality of responses.
You will evaluate responses based on specific criteria and provide scores with explanations.
Be objective, fair, and consistent in your evaluations.";

/// Build the user message asking a juror to score every candidate on every criterion.
pub fn build_evaluation_prompt(
    prompt: &str,
    responses: &[ResponseCandidate],
    criteria: &[CriterionConfig],
    require_explanation: bool,
) -> String {
    let mut out = String::from("Please evaluate the following responses to the given prompt.\n\n");
    out.push_str(&format!("**Original Prompt:**\n{prompt}\n\n"));

    out.push_str("**Responses to Evaluate:**\n");
    for (i, response) in responses.iter().enumerate() {
        out.push_str(&format!("**Response {} - id `{}`", i + 1, response.id));
        if let Some(alias) = &response.alias {
            out.push_str(&format!(" ({alias})"));
        }
        if let Some(model) = &response.model_name {
            out.push_str(&format!(" (Model: {model})"));
        }
        out.push_str(&format!(":**\n{}\n\n", response.content));
    }

    out.push_str("**Evaluation Criteria:**\n");
    for (i, criterion) in criteria.iter().enumerate() {
        out.push_str(&format!(
            "{}. **{}** (Weight: {}, Scale: 0-{}): {}\n",
            i + 1,
            criterion.name,
            criterion.weight,
            criterion.max_score,
            criterion.description
        ));
    }

    let example_id = responses.first().map(|r| r.id.as_str()).unwrap_or("response_1");
    let example_criterion = criteria
        .first()
        .map(|c| c.name.as_str())
        .unwrap_or("CRITERION_NAME");
    let explanation_rule = if require_explanation {
        "2. Provide a brief explanation for every score"
    } else {
        "2. Explanations are optional but encouraged"
    };

    out.push_str("\n**Instructions:**\n");
    out.push_str(
        "1. Score every response on every criterion with a whole number within that criterion's scale\n",
    );
    out.push_str(&format!("{explanation_rule}\n"));
    out.push_str("3. Be objective and consider only the quality relative to the criteria\n");
    out.push_str("4. Use the exact response ids and criterion names shown above\n");
    out.push_str("5. Format your response as JSON with the following structure:\n\n");
    out.push_str(&format!(
        r#"```json
{{
  "evaluations": [
    {{
      "response_id": "{example_id}",
      "scores": {{
        "{example_criterion}": {{
          "score": 4,
          "explanation": "Brief explanation for this score"
        }}
      }},
      "overall_comment": "Optional overall comment about this response"
    }}
  ]
}}
```
"#
    ));
    out.push_str("\nPlease provide your evaluation now.");
    out
}
