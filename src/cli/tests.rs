use clap::Parser;
use serde_json::json;

use super::args::{Cli, Commands, parse_var};
use promptrun_utils::logging::LogFormat;

#[test]
fn test_parse_var_reads_json_then_falls_back_to_string() {
    assert_eq!(parse_var("n=3").unwrap(), ("n".to_string(), json!(3)));
    assert_eq!(parse_var("flag=true").unwrap(), ("flag".to_string(), json!(true)));
    assert_eq!(parse_var("tags=[\"a\"]").unwrap(), ("tags".to_string(), json!(["a"])));
    assert_eq!(parse_var("name=Ada").unwrap(), ("name".to_string(), json!("Ada")));
    assert_eq!(parse_var("eq=a=b").unwrap(), ("eq".to_string(), json!("a=b")));
    assert_eq!(parse_var("empty=").unwrap(), ("empty".to_string(), json!("")));
}

#[test]
fn test_parse_var_rejects_malformed() {
    assert!(parse_var("novalue").is_err());
    assert!(parse_var("=3").is_err());
}

#[test]
fn test_run_subcommand_collects_variables() {
    let cli = Cli::try_parse_from([
        "promptrun",
        "--library",
        "lib.yaml",
        "run",
        "support",
        "--var",
        "customer=Ada",
        "--var",
        "order=42",
        "--user-var",
        "question=where is it?",
        "--max-llm-calls",
        "3",
        "--json",
    ])
    .unwrap();

    assert_eq!(cli.library.as_deref(), Some(std::path::Path::new("lib.yaml")));
    let Commands::Run(args) = cli.command else {
        panic!("expected run");
    };
    assert_eq!(args.prompt_id, "support");
    assert_eq!(args.vars.len(), 2);
    assert_eq!(args.vars[1], ("order".to_string(), json!(42)));
    assert_eq!(args.user_vars[0].1, json!("where is it?"));
    assert_eq!(args.max_llm_calls, Some(3));
    assert!(args.json);
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli =
        Cli::try_parse_from(["promptrun", "config", "--json", "--log-format", "json", "-v"]).unwrap();
    assert!(cli.verbose);
    assert_eq!(cli.log_format, LogFormat::Json);
    assert!(cli.command.json());
}

#[test]
fn test_unknown_log_format_rejected() {
    assert!(Cli::try_parse_from(["promptrun", "prompts", "--log-format", "xml"]).is_err());
}
