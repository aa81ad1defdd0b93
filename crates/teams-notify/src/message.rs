//! Turns a finished analysis into a [`Payload`].
//!
//! The quality gate verdict becomes the first fact, followed by one fact per
//! condition in gate order. Projects configured for failures only see just
//! the degraded and failed conditions.

use tracing::warn;

use crate::analysis::{Condition, EvaluationStatus, GateStatus, Operator, ProjectAnalysis};
use crate::catalog::{metric_name_key, MetricCatalog, MESSAGE_LOCALE};
use crate::error::NotifyError;
use crate::payload::{Fact, Payload};
use crate::project_config::ProjectConfig;

/// Name of the leading fact carrying the overall gate verdict.
pub const GATE_STATUS_FACT: &str = "Quality gate status";

/// Metrics whose values are shown as percentages.
const PERCENTAGE_METRICS: &[&str] = &["new_coverage", "new_sqale_debt_ratio"];

/// Inputs for a single message.
#[derive(Clone, Copy)]
pub struct MessageContext<'a> {
    pub analysis: &'a ProjectAnalysis,
    pub project_config: &'a ProjectConfig,
    /// Link behind the "See report" action.
    pub project_url: &'a str,
    pub catalog: &'a dyn MetricCatalog,
    /// Mention non-main branches in the subtitle.
    pub include_branch: bool,
}

/// Build the message card for an analysis.
///
/// # Errors
///
/// Returns [`NotifyError::InvalidArgument`] when the project URL is blank.
pub fn build_payload(ctx: &MessageContext<'_>) -> Result<Payload, NotifyError> {
    if ctx.project_url.trim().is_empty() {
        return Err(NotifyError::InvalidArgument("projectUrl".to_string()));
    }

    let mut facts = Vec::new();
    if let Some(gate) = &ctx.analysis.quality_gate {
        facts.push(Fact::new(
            GATE_STATUS_FACT,
            format!("{} {}", gate_symbol(gate.status), gate.status),
        ));
        facts.extend(
            gate.conditions
                .iter()
                .filter(|c| !ctx.project_config.failures_only || c.status.is_failure())
                .map(|c| condition_fact(c, ctx.catalog)),
        );
    }

    Ok(Payload::new(
        subtitle(ctx),
        facts,
        ctx.project_url.to_string(),
    ))
}

/// Dashboard link for the analyzed project. `server_url` ends with `/`.
#[must_use]
pub fn project_url(server_url: &str, analysis: &ProjectAnalysis, include_branch: bool) -> String {
    let mut url = format!(
        "{server_url}dashboard?id={}",
        urlencoding::encode(&analysis.project.key)
    );
    if include_branch {
        if let Some(branch) = analysis.non_main_branch_name() {
            url.push_str("&branch=");
            url.push_str(&urlencoding::encode(branch));
        }
    }
    url
}

fn subtitle(ctx: &MessageContext<'_>) -> String {
    let mut text = String::new();
    let mention = &ctx.project_config.mention;
    if !mention.trim().is_empty() {
        text.push_str(&format!("<!{mention}> "));
    }
    text.push_str(&format!(
        "Project {} was analyzed",
        ctx.analysis.project.name
    ));
    if ctx.include_branch {
        if let Some(branch) = ctx.analysis.non_main_branch_name() {
            text.push_str(&format!(" for branch {branch}"));
        }
    }
    text.push('.');
    text
}

fn condition_fact(condition: &Condition, catalog: &dyn MetricCatalog) -> Fact {
    let name = catalog.message(
        MESSAGE_LOCALE,
        &metric_name_key(&condition.metric_key),
        &condition.metric_key,
    );

    if condition.status == EvaluationStatus::NoValue {
        return Fact::new(name, condition.status.as_str());
    }

    let suffix = if is_percentage_metric(&condition.metric_key) {
        "%"
    } else {
        ""
    };

    let mut value = format!(
        "{} {}{suffix}",
        evaluation_symbol(condition.status),
        render_measure(&condition.metric_key, &condition.value)
    );
    if let Some(threshold) = &condition.error_threshold {
        value.push_str(&format!(
            ", error if {}{}{suffix}",
            operator_symbol(condition.operator),
            render_measure(&condition.metric_key, threshold)
        ));
    }

    Fact::new(name, value)
}

fn render_measure(metric_key: &str, raw: &str) -> String {
    if raw.is_empty() {
        return "-".to_string();
    }
    if !is_percentage_metric(metric_key) {
        return raw.to_string();
    }
    format_percentage(raw).unwrap_or_else(|| {
        warn!(
            metric = %metric_key,
            value = %raw,
            "Failed to format value as a percentage, using it as is"
        );
        raw.to_string()
    })
}

fn is_percentage_metric(metric_key: &str) -> bool {
    PERCENTAGE_METRICS.contains(&metric_key)
}

/// Format a decimal with at most two fraction digits and `,` grouping.
///
/// Output does not depend on the process locale. Returns `None` for values
/// that are not finite numbers.
fn format_percentage(raw: &str) -> Option<String> {
    let number: f64 = raw.trim().parse().ok()?;
    if !number.is_finite() {
        return None;
    }

    let fixed = format!("{number:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    let (sign, digits) = trimmed
        .strip_prefix('-')
        .map_or(("", trimmed), |rest| ("-", rest));
    let (integer, fraction) = digits
        .split_once('.')
        .map_or((digits, None), |(i, f)| (i, Some(f)));

    let mut out = format!("{sign}{}", group_thousands(integer));
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    Some(out)
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

const fn gate_symbol(status: GateStatus) -> &'static str {
    match status {
        GateStatus::Ok => "\u{1F7E2}",
        GateStatus::Warn => "\u{1F7E0}",
        GateStatus::Error => "\u{1F534}",
    }
}

const fn evaluation_symbol(status: EvaluationStatus) -> &'static str {
    match status {
        EvaluationStatus::Ok => "\u{1F7E2}",
        EvaluationStatus::Warn => "\u{1F7E0}",
        EvaluationStatus::Error => "\u{1F534}",
        EvaluationStatus::NoValue => "\u{26AA}\u{FE0F}",
    }
}

const fn operator_symbol(operator: Operator) -> &'static str {
    match operator {
        Operator::Eq => "==",
        Operator::Neq => "!=",
        Operator::Gt => ">",
        Operator::Lt => "<",
        Operator::Unknown => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Branch, Project, QualityGate};
    use crate::catalog::{KeyFallbackCatalog, MapCatalog};

    const URL: &str = "http://localhost:9000/dashboard?id=project:key";

    fn condition(
        metric_key: &str,
        status: EvaluationStatus,
        operator: Operator,
        threshold: Option<&str>,
        value: &str,
    ) -> Condition {
        Condition {
            metric_key: metric_key.to_string(),
            status,
            operator,
            error_threshold: threshold.map(str::to_string),
            value: value.to_string(),
        }
    }

    fn analysis(gate: Option<QualityGate>) -> ProjectAnalysis {
        ProjectAnalysis {
            project: Project {
                key: "project:key".to_string(),
                name: "Sonar Project Name".to_string(),
            },
            branch: None,
            quality_gate: gate,
        }
    }

    fn config(failures_only: bool, mention: &str) -> ProjectConfig {
        ProjectConfig {
            webhook_url: "hook".to_string(),
            project_key_or_pattern: "key".to_string(),
            mention: mention.to_string(),
            failures_only,
        }
    }

    fn build(analysis: &ProjectAnalysis, config: &ProjectConfig, include_branch: bool) -> Payload {
        build_payload(&MessageContext {
            analysis,
            project_config: config,
            project_url: URL,
            catalog: &KeyFallbackCatalog,
            include_branch,
        })
        .unwrap()
    }

    fn three_conditions() -> QualityGate {
        QualityGate {
            status: GateStatus::Error,
            conditions: vec![
                condition("new_code_smells", EvaluationStatus::Ok, Operator::Gt, Some("10"), "2"),
                condition("functions", EvaluationStatus::Warn, Operator::Gt, Some("0"), "1"),
                condition("violations", EvaluationStatus::Error, Operator::Gt, Some("5"), "10"),
            ],
        }
    }

    #[test]
    fn test_ok_gate_without_conditions() {
        let analysis = analysis(Some(QualityGate {
            status: GateStatus::Ok,
            conditions: vec![],
        }));
        let payload = build(&analysis, &config(false, ""), false);

        assert_eq!(
            payload.section().facts(),
            &[Fact::new("Quality gate status", "🟢 OK")]
        );
        assert_eq!(payload.action().name(), "See report");
        assert_eq!(payload.action().target(), URL);
    }

    #[test]
    fn test_failures_only_drops_passing_conditions() {
        let analysis = analysis(Some(three_conditions()));
        let payload = build(&analysis, &config(true, ""), false);

        let facts = payload.section().facts();
        assert_eq!(facts.len(), 3);
        assert_eq!(facts[0], Fact::new("Quality gate status", "🔴 ERROR"));
        assert_eq!(facts[1], Fact::new("functions", "🟠 1, error if >0"));
        assert_eq!(facts[2], Fact::new("violations", "🔴 10, error if >5"));
    }

    #[test]
    fn test_all_conditions_kept_in_order() {
        let analysis = analysis(Some(three_conditions()));
        let payload = build(&analysis, &config(false, ""), false);

        let names: Vec<&str> = payload
            .section()
            .facts()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["Quality gate status", "new_code_smells", "functions", "violations"]
        );
    }

    #[test]
    fn test_no_quality_gate_has_no_facts() {
        let payload = build(&analysis(None), &config(false, ""), false);
        assert!(payload.section().facts().is_empty());
        assert_eq!(
            payload.section().activity_subtitle(),
            "Project Sonar Project Name was analyzed."
        );
        assert_eq!(payload.section().activity_title(), "Sonar Quality Report");
    }

    #[test]
    fn test_mention_prefix() {
        let payload = build(&analysis(None), &config(false, "channel"), false);
        assert_eq!(
            payload.section().activity_subtitle(),
            "<!channel> Project Sonar Project Name was analyzed."
        );

        let blank = build(&analysis(None), &config(false, "   "), false);
        assert_eq!(
            blank.section().activity_subtitle(),
            "Project Sonar Project Name was analyzed."
        );
    }

    #[test]
    fn test_branch_clause() {
        let mut on_branch = analysis(None);
        on_branch.branch = Some(Branch {
            is_main: false,
            name: Some("feature-x".to_string()),
        });
        assert_eq!(
            build(&on_branch, &config(false, ""), true)
                .section()
                .activity_subtitle(),
            "Project Sonar Project Name was analyzed for branch feature-x."
        );
        assert_eq!(
            build(&on_branch, &config(false, ""), false)
                .section()
                .activity_subtitle(),
            "Project Sonar Project Name was analyzed."
        );

        let mut on_main = analysis(None);
        on_main.branch = Some(Branch {
            is_main: true,
            name: Some("main".to_string()),
        });
        assert_eq!(
            build(&on_main, &config(false, ""), true)
                .section()
                .activity_subtitle(),
            "Project Sonar Project Name was analyzed."
        );

        let mut unnamed = analysis(None);
        unnamed.branch = Some(Branch {
            is_main: false,
            name: None,
        });
        assert_eq!(
            build(&unnamed, &config(false, ""), true)
                .section()
                .activity_subtitle(),
            "Project Sonar Project Name was analyzed."
        );
    }

    #[test]
    fn test_condition_rendering() {
        let catalog = MapCatalog::new()
            .with_metric("new_vulnerabilities", "New Vulnerabilities")
            .with_metric("new_sqale_debt_ratio", "Technical Debt Ratio on New Code")
            .with_metric("new_coverage", "Coverage on New Code");
        let analysis = analysis(Some(QualityGate {
            status: GateStatus::Ok,
            conditions: vec![
                condition("new_vulnerabilities", EvaluationStatus::Ok, Operator::Gt, Some("0"), "0"),
                condition(
                    "new_sqale_debt_ratio",
                    EvaluationStatus::Ok,
                    Operator::Gt,
                    Some("10.0"),
                    "0.01",
                ),
                condition(
                    "new_coverage",
                    EvaluationStatus::Error,
                    Operator::Lt,
                    Some("80.0"),
                    "75.5066666666666667",
                ),
                condition("new_duplicated_lines", EvaluationStatus::NoValue, Operator::Gt, Some("3"), ""),
                condition("new_bugs", EvaluationStatus::Warn, Operator::Unknown, None, ""),
                condition("new_coverage", EvaluationStatus::Error, Operator::Neq, Some("abc"), "n/a"),
            ],
        }));
        let config = config(false, "");
        let payload = build_payload(&MessageContext {
            analysis: &analysis,
            project_config: &config,
            project_url: URL,
            catalog: &catalog,
            include_branch: false,
        })
        .unwrap();

        let facts = payload.section().facts();
        assert_eq!(facts[1], Fact::new("New Vulnerabilities", "🟢 0, error if >0"));
        assert_eq!(
            facts[2],
            Fact::new("Technical Debt Ratio on New Code", "🟢 0.01%, error if >10%")
        );
        assert_eq!(
            facts[3],
            Fact::new("Coverage on New Code", "🔴 75.51%, error if <80%")
        );
        assert_eq!(facts[4], Fact::new("new_duplicated_lines", "NO_VALUE"));
        assert_eq!(facts[5], Fact::new("new_bugs", "🟠 -"));
        assert_eq!(
            facts[6],
            Fact::new("Coverage on New Code", "🔴 n/a%, error if !=abc%")
        );
    }

    #[test]
    fn test_percentage_formatting() {
        assert_eq!(format_percentage("75.5066666").as_deref(), Some("75.51"));
        assert_eq!(format_percentage("10.0").as_deref(), Some("10"));
        assert_eq!(format_percentage("0.1").as_deref(), Some("0.1"));
        assert_eq!(format_percentage(" 3 ").as_deref(), Some("3"));
        assert_eq!(format_percentage("1234567.891").as_deref(), Some("1,234,567.89"));
        assert_eq!(format_percentage("-2.5").as_deref(), Some("-2.5"));
        assert_eq!(format_percentage("abc"), None);
        assert_eq!(format_percentage("NaN"), None);
    }

    #[test]
    fn test_non_percentage_metrics_have_no_suffix() {
        let fact = condition_fact(
            &condition("new_bugs", EvaluationStatus::Error, Operator::Gt, Some("0.5"), "1.23456"),
            &KeyFallbackCatalog,
        );
        assert_eq!(fact.value, "🔴 1.23456, error if >0.5");
    }

    #[test]
    fn test_empty_percentage_value() {
        let fact = condition_fact(
            &condition("new_coverage", EvaluationStatus::Error, Operator::Lt, Some("80"), ""),
            &KeyFallbackCatalog,
        );
        assert_eq!(fact.value, "🔴 -%, error if <80%");
    }

    #[test]
    fn test_missing_project_url_is_invalid() {
        let analysis = analysis(None);
        let config = config(false, "");
        let err = build_payload(&MessageContext {
            analysis: &analysis,
            project_config: &config,
            project_url: " ",
            catalog: &KeyFallbackCatalog,
            include_branch: false,
        })
        .unwrap_err();
        assert!(matches!(err, NotifyError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_project_name_still_builds() {
        let mut analysis = analysis(None);
        analysis.project.name = String::new();
        let payload = build(&analysis, &config(false, ""), false);
        assert_eq!(payload.section().activity_subtitle(), "Project  was analyzed.");
    }

    #[test]
    fn test_project_url() {
        let mut analysis = analysis(None);
        assert_eq!(
            project_url("https://sonar/", &analysis, true),
            "https://sonar/dashboard?id=project%3Akey"
        );

        analysis.branch = Some(Branch {
            is_main: false,
            name: Some("feature/x".to_string()),
        });
        assert_eq!(
            project_url("https://sonar/", &analysis, true),
            "https://sonar/dashboard?id=project%3Akey&branch=feature%2Fx"
        );
        assert_eq!(
            project_url("https://sonar/", &analysis, false),
            "https://sonar/dashboard?id=project%3Akey"
        );
    }
}
