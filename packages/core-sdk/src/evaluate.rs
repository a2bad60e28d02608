//! Prompt evaluation: deterministic heuristics plus an LLM-as-judge pass
//! routed through [`RouterContext`].

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::Result;
use crate::models::{CompletionRequest, Message};
use crate::router::RouterContext;
use crate::telemetry;

const XML_TAGS: &[&str] = &[
    "code",
    "requirements",
    "context",
    "example",
    "document",
    "thinking",
    "output",
    "test_file",
    "source_code",
    "analysis",
    "quotes",
    "evaluation",
];
const COT_KEYWORDS: &[&str] = &[
    "step-by-step",
    "think through",
    "reasoning",
    "analyze",
    "before",
    "first",
    "then",
];
const ROLE_INDICATORS: &[&str] = &["you are a", "you are an", "act as", "role:", "persona:"];
const TOT_KEYWORDS: &[&str] = &[
    "approach a",
    "approach b",
    "approach c",
    "alternative",
    "option 1",
    "option 2",
    "multiple approaches",
    "different solutions",
];
const TOT_TAGS: &[&str] = &[
    "<approach_a>",
    "<approach_b>",
    "<approach_c>",
    "<option_1>",
    "<option_2>",
    "<alternative_",
];
const JUDGE_KEYWORDS: &[&str] = &[
    "rubric",
    "evaluate",
    "score",
    "rate",
    "criteria",
    "weighted",
    "judge",
    "assessment",
    "compare",
    "0-10",
    "1-10",
];

/** \brief 已知技巧及其评审要点。 */
const TACTICS: &[(&str, &str)] = &[
    (
        "Role Prompting",
        "a specific, relevant persona with a clear domain of expertise",
    ),
    (
        "Structured Inputs",
        "meaningful organization with clear section boundaries",
    ),
    (
        "Few-Shot Examples",
        "high-quality examples that teach the desired pattern",
    ),
    ("Chain-of-Thought", "explicit, systematic reasoning instructions"),
    (
        "Reference Citations",
        "proper document structure and quote extraction",
    ),
    (
        "Prompt Chaining",
        "a multi-step workflow with clear dependencies between steps",
    ),
    (
        "LLM-as-Judge",
        "clear evaluation rubrics with weighted criteria",
    ),
    (
        "Tree of Thoughts",
        "several solution approaches explored side by side",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    fn from_chars(chars: usize) -> Self {
        if chars > 1000 {
            Complexity::High
        } else if chars > 300 {
            Complexity::Medium
        } else {
            Complexity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

/**
 * \brief 对提示词的客观统计。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMetrics {
    pub has_system_message: bool,
    pub xml_tags_found: Vec<String>,
    pub uses_xml_structure: bool,
    pub example_count: usize,
    pub uses_few_shot: bool,
    pub cot_keywords_found: Vec<String>,
    pub uses_cot: bool,
    pub role_indicators: Vec<String>,
    pub uses_role_prompting: bool,
    pub tot_keywords_found: Vec<String>,
    pub uses_tree_of_thoughts: bool,
    pub judge_keywords_found: Vec<String>,
    pub uses_llm_as_judge: bool,
    pub uses_document_structure: bool,
    pub total_characters: usize,
    pub complexity: Complexity,
}

fn found(haystack: &str, needles: &[&str]) -> Vec<String> {
    needles
        .iter()
        .filter(|n| haystack.contains(*n))
        .map(|n| n.to_string())
        .collect()
}

/** \brief 会话的纯文本形式，评审提示词与统计共用。 */
fn render_conversation(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content.as_deref().unwrap_or("")))
        .collect::<Vec<_>>()
        .join("\n")
}

/**
 * \brief 计算确定性的提示词指标。
 */
pub fn prompt_metrics(messages: &[Message]) -> PromptMetrics {
    let text = render_conversation(messages);
    let lower = text.to_lowercase();

    let xml_tags_found: Vec<String> = XML_TAGS
        .iter()
        .filter(|tag| lower.contains(&format!("<{}>", tag)))
        .map(|tag| tag.to_string())
        .collect();
    let example_count = messages.iter().filter(|m| m.role == "assistant").count();
    let cot_keywords_found = found(&lower, COT_KEYWORDS);
    let role_indicators = found(&lower, ROLE_INDICATORS);

    let tot_words = found(&lower, TOT_KEYWORDS);
    let tot_tags = found(&lower, TOT_TAGS);
    let uses_tree_of_thoughts = tot_words.len() >= 2 || tot_tags.len() >= 2;
    let tot_keywords_found = tot_words.into_iter().chain(tot_tags).collect();

    let judge_keywords_found = found(&lower, JUDGE_KEYWORDS);
    let uses_llm_as_judge = judge_keywords_found.len() >= 3
        || (judge_keywords_found.len() >= 2 && text.contains('%'));

    let uses_document_structure = (lower.contains("<documents>") || lower.contains("<document>"))
        && lower.contains("<source>");
    let total_characters = text.chars().count();

    PromptMetrics {
        has_system_message: messages.iter().any(|m| m.role == "system"),
        uses_xml_structure: !xml_tags_found.is_empty(),
        xml_tags_found,
        example_count,
        uses_few_shot: example_count >= 2,
        uses_cot: !cot_keywords_found.is_empty(),
        cot_keywords_found,
        uses_role_prompting: !role_indicators.is_empty(),
        role_indicators,
        tot_keywords_found,
        uses_tree_of_thoughts,
        judge_keywords_found,
        uses_llm_as_judge,
        uses_document_structure,
        total_characters,
        complexity: Complexity::from_chars(total_characters),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

impl PromptMetrics {
    /**
     * \brief 纯文本指标报告。
     */
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "TRADITIONAL METRICS");
        let _ = writeln!(out, "Structure:");
        let _ = writeln!(out, "- system message: {}", yes_no(self.has_system_message));
        let _ = writeln!(out, "- xml tags: {}", list_or_none(&self.xml_tags_found));
        let _ = writeln!(out, "- structured inputs: {}", yes_no(self.uses_xml_structure));
        let _ = writeln!(out, "Tactics:");
        let _ = writeln!(
            out,
            "- few-shot examples: {} ({})",
            self.example_count,
            yes_no(self.uses_few_shot)
        );
        let _ = writeln!(
            out,
            "- chain-of-thought: {} ({})",
            list_or_none(&self.cot_keywords_found),
            yes_no(self.uses_cot)
        );
        let _ = writeln!(
            out,
            "- role prompting: {} ({})",
            list_or_none(&self.role_indicators),
            yes_no(self.uses_role_prompting)
        );
        let _ = writeln!(
            out,
            "- tree of thoughts: {} ({})",
            list_or_none(&self.tot_keywords_found),
            yes_no(self.uses_tree_of_thoughts)
        );
        let _ = writeln!(
            out,
            "- llm-as-judge: {} ({})",
            list_or_none(&self.judge_keywords_found),
            yes_no(self.uses_llm_as_judge)
        );
        let _ = writeln!(
            out,
            "- document structure: {}",
            yes_no(self.uses_document_structure)
        );
        let _ = writeln!(out, "Complexity:");
        let _ = writeln!(out, "- characters: {}", self.total_characters);
        let _ = write!(out, "- level: {}", self.complexity.as_str().to_uppercase());
        out
    }
}

/**
 * \brief 构造 LLM-as-judge 评审提示词，只列出已知的期望技巧。
 */
pub fn judge_prompt(metrics: &PromptMetrics, messages: &[Message], tactics: &[&str]) -> String {
    let criteria = tactics
        .iter()
        .filter_map(|t| TACTICS.iter().find(|(name, _)| name == t))
        .enumerate()
        .map(|(i, (name, focus))| format!("{}. **{}**: check for {}", i + 1, name, focus))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert prompt engineering instructor reviewing a student's prompt.\n\n\
<traditional_metrics>\n{metrics}\n</traditional_metrics>\n\n\
<student_prompt>\n{prompt}\n</student_prompt>\n\n\
<expected_tactics>\n{expected}\n</expected_tactics>\n\n\
<evaluation_criteria>\n\
The metrics show which patterns are present. Judge how well each expected tactic is applied, \
and evaluate only these tactics:\n\n{criteria}\n</evaluation_criteria>\n\n\
For each expected tactic give a quality score out of 10, quote the evidence, explain the score \
and suggest one concrete improvement.\n\n\
Answer with these sections:\n\
<evaluation>one block per tactic</evaluation>\n\
<combined_score>0-100, weighting pattern presence 40% and implementation quality 60%; show the calculation</combined_score>\n\
<overall_feedback>two or three encouraging, actionable sentences</overall_feedback>",
        metrics = metrics.summary(),
        prompt = render_conversation(messages),
        expected = tactics.join(", "),
        criteria = criteria,
    )
}

/**
 * \brief 一次完整评审的结果。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub activity: String,
    pub metrics: PromptMetrics,
    pub judgment: String,
}

impl Evaluation {
    pub fn report(&self) -> String {
        format!(
            "EVALUATION: {}\n\n{}\n\nJUDGE\n{}",
            self.activity,
            self.metrics.summary(),
            self.judgment
        )
    }
}

/**
 * \brief 计算指标后经路由器请求评审；路由错误原样返回。
 */
pub async fn evaluate_prompt(
    ctx: &RouterContext,
    messages: &[Message],
    activity: &str,
    tactics: &[&str],
) -> Result<Evaluation> {
    let metrics = prompt_metrics(messages);
    let prompt = judge_prompt(&metrics, messages, tactics);
    let judgment = ctx
        .complete(&CompletionRequest::new(vec![Message::user(prompt)]))
        .await?;
    telemetry::log_event(
        "evaluate",
        &format!(
            "activity={} tactics={} complexity={}",
            activity,
            tactics.len(),
            metrics.complexity.as_str()
        ),
    );
    Ok(Evaluation {
        activity: activity.to_string(),
        metrics,
        judgment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::error::RouterError;
    use crate::testing::StubTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn structured_prompt() -> Vec<Message> {
        vec![
            Message::system("You are a senior QA engineer. Think through each case step-by-step."),
            Message::user("<code>fn add(a: i32, b: i32) -> i32 { a + b }</code>"),
            Message::assistant("<analysis>covers overflow</analysis>"),
            Message::user("<requirements>edge cases</requirements>"),
            Message::assistant("ok"),
        ]
    }

    #[test]
    fn test_metrics_detect_tactics() {
        let m = prompt_metrics(&structured_prompt());
        assert!(m.has_system_message);
        assert_eq!(m.xml_tags_found, vec!["code", "requirements", "analysis"]);
        assert_eq!(m.example_count, 2);
        assert!(m.uses_few_shot);
        assert!(m.uses_cot);
        assert!(m.cot_keywords_found.contains(&"step-by-step".to_string()));
        assert_eq!(m.role_indicators, vec!["you are a"]);
        assert!(!m.uses_tree_of_thoughts);
        assert!(!m.uses_document_structure);
        assert_eq!(m.complexity, Complexity::Low);
    }

    #[test]
    fn test_metrics_judge_and_tree_of_thoughts_thresholds() {
        let two_with_percent = vec![Message::user("Score each answer against the criteria: style 40%")];
        assert!(prompt_metrics(&two_with_percent).uses_llm_as_judge);

        let two_without = vec![Message::user("Score each answer against the criteria.")];
        assert!(!prompt_metrics(&two_without).uses_llm_as_judge);

        let tot = vec![Message::user("<approach_a>x</approach_a><approach_b>y</approach_b>")];
        assert!(prompt_metrics(&tot).uses_tree_of_thoughts);
    }

    #[test]
    fn test_metrics_document_structure_and_complexity() {
        let long = "x".repeat(1200);
        let msgs = vec![Message::user(format!(
            "<documents><document><source>a.md</source>{}</document></documents>",
            long
        ))];
        let m = prompt_metrics(&msgs);
        assert!(m.uses_document_structure);
        assert_eq!(m.complexity, Complexity::High);
        assert!(m.summary().contains("level: HIGH"));
    }

    #[test]
    fn test_judge_prompt_lists_only_known_tactics() {
        let msgs = structured_prompt();
        let m = prompt_metrics(&msgs);
        let prompt = judge_prompt(&m, &msgs, &["Role Prompting", "Telepathy", "Chain-of-Thought"]);
        assert!(prompt.contains("1. **Role Prompting**"));
        assert!(prompt.contains("2. **Chain-of-Thought**"));
        assert!(!prompt.contains("**Telepathy**"));
        assert!(prompt.contains("<student_prompt>\nsystem: You are a senior QA engineer."));
    }

    #[tokio::test]
    async fn test_evaluate_prompt_routes_judge_request() {
        let stub = Arc::new(StubTransport::replying(json!({
            "content": [{"type": "text", "text": "<evaluation>good</evaluation>"}]
        })));
        let ctx =
            RouterContext::with_transport(&Settings::default(), stub.clone()).expect("router");
        let eval = evaluate_prompt(&ctx, &structured_prompt(), "Activity 2.1", &["Role Prompting"])
            .await
            .expect("evaluate");
        assert_eq!(eval.judgment, "<evaluation>good</evaluation>");
        assert!(eval.report().starts_with("EVALUATION: Activity 2.1"));

        let sent = stub.last_request();
        let content = sent.body["messages"][0]["content"].as_str().expect("content");
        assert!(content.contains("<expected_tactics>\nRole Prompting\n</expected_tactics>"));
    }

    #[tokio::test]
    async fn test_evaluate_prompt_propagates_router_errors() {
        let stub = Arc::new(StubTransport::failing("timeout"));
        let ctx = RouterContext::with_transport(&Settings::default(), stub).expect("router");
        let err = evaluate_prompt(&ctx, &structured_prompt(), "Activity 2.1", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::AdapterFailure { .. }));
    }
}
