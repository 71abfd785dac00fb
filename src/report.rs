use crate::t_args;
use crate::types::{CaseResult, Summary};
use colored::Colorize;

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    pub hide_passes: bool,
    pub hide_fails: bool,
}

pub fn render_human(summary: &Summary, options: ReportOptions) -> String {
    let mut out = String::new();
    if !summary.name.is_empty() {
        out.push_str(&format!("{}\n", summary.name.bold().underline()));
    }
    for c in &summary.cases {
        if c.passed && !options.hide_passes {
            out.push_str(&format!("{} {}\n", "[OK]".green().bold(), c.title.green()));
        } else if !c.passed && !options.hide_fails {
            render_failure(&mut out, c);
        }
    }
    let failed = if summary.failed > 0 {
        summary.failed.to_string().red().bold().to_string()
    } else {
        summary.failed.to_string().green().to_string()
    };
    let header = t_args!("report-totals",
        "total" => summary.total,
        "passed" => summary.passed.to_string().green(),
        "failed" => failed
    );
    out.push_str(&header);
    out.push('\n');
    if summary.total_expectations > 0 {
        out.push_str(&t_args!("report-expectations",
            "total" => summary.total_expectations,
            "passed" => summary.passed_expectations,
            "failed" => summary.failed_expectations
        ));
        out.push('\n');
    }
    out
}

fn render_failure(out: &mut String, c: &CaseResult) {
    out.push_str(&format!(
        "{} {}\n",
        "[FAIL]".red().bold(),
        c.title.red().bold()
    ));
    if let Some(err) = &c.error {
        out.push_str(&format!("  {} {}\n", "error   :".bold(), err.red()));
    }
    for f in &c.failures {
        let label = match f.index {
            Some(i) => format!("assert[{i}]:"),
            None => "assert   :".to_string(),
        };
        let mut lines = f.message.lines();
        if let Some(first) = lines.next() {
            out.push_str(&format!("  {} {}\n", label.bold(), first));
        }
        for line in lines {
            out.push_str(&format!("    {line}\n"));
        }
    }
}

pub fn print_human(summary: &Summary, options: ReportOptions) {
    print!("{}", render_human(summary, options));
}
