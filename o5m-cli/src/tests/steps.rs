//! Behaviour-driven step definitions driving the CLI scenarios.

use super::convert::{ConvertConfig, execute};
use super::helpers::{Dataset, LayerOverrides, merge_layers};
use super::*;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use rusqlite::Connection;
use std::cell::RefCell;

/// Scenario state shared by every step through a single world argument.
#[derive(Debug)]
struct CliWorld {
    dataset: Dataset,
    cli_args: RefCell<Vec<String>>,
    config_layer: RefCell<Option<LayerOverrides>>,
    env_layer: RefCell<Option<LayerOverrides>>,
    resolved: RefCell<Option<ConvertConfig>>,
    outcome: RefCell<Option<Result<String, CliError>>>,
}

impl CliWorld {
    fn new() -> Self {
        Self {
            dataset: Dataset::new(),
            cli_args: RefCell::new(Vec::new()),
            config_layer: RefCell::new(None),
            env_layer: RefCell::new(None),
            resolved: RefCell::new(None),
            outcome: RefCell::new(None),
        }
    }

    fn invocation(&self, subcommand: &str) -> Vec<String> {
        let mut invocation = vec!["o5m2sqlite".to_owned(), subcommand.to_owned()];
        invocation.extend(self.cli_args.borrow().iter().cloned());
        invocation
    }

    fn output(&self) -> String {
        let borrowed = self.outcome.borrow();
        borrowed
            .as_ref()
            .expect("command ran")
            .as_ref()
            .expect("expected success")
            .clone()
    }

    fn with_error(&self, check: impl FnOnce(&CliError)) {
        let borrowed = self.outcome.borrow();
        let error = borrowed
            .as_ref()
            .expect("command ran")
            .as_ref()
            .expect_err("expected error");
        check(error);
    }
}

#[fixture]
fn world() -> CliWorld {
    CliWorld::new()
}

#[given("an o5m extract exists on disk")]
fn extract_exists(#[from(world)] world: &CliWorld) {
    assert!(
        world.dataset.extract().exists(),
        "expected the extract to exist on disk"
    );
}

#[given("I pass the extract and database paths with CLI flags")]
fn cli_provides_paths(#[from(world)] world: &CliWorld) {
    world.cli_args.borrow_mut().extend([
        format!("--{ARG_O5M}"),
        world.dataset.extract().to_string(),
        format!("--{ARG_DATABASE}"),
        world.dataset.database().to_string(),
    ]);
}

#[given("I pass only the extract path with a CLI flag")]
fn cli_only_extract(#[from(world)] world: &CliWorld) {
    world
        .cli_args
        .borrow_mut()
        .extend([format!("--{ARG_O5M}"), world.dataset.extract().to_string()]);
}

#[given("I pass a missing extract path with CLI flags")]
fn cli_missing_extract(#[from(world)] world: &CliWorld) {
    world.cli_args.borrow_mut().extend([
        format!("--{ARG_O5M}"),
        world.dataset.missing_extract().to_string(),
        format!("--{ARG_DATABASE}"),
        world.dataset.database().to_string(),
    ]);
}

#[given("the extract path is provided via a config file")]
fn extract_via_config(#[from(world)] world: &CliWorld) {
    *world.config_layer.borrow_mut() = Some(LayerOverrides {
        o5m: Some(world.dataset.config_extract().to_path_buf()),
        database: Some(world.dataset.database()),
    });
}

#[given("the database path is provided via environment variables")]
fn database_via_env(#[from(world)] world: &CliWorld) {
    *world.env_layer.borrow_mut() = Some(LayerOverrides {
        database: Some(world.dataset.env_database()),
        ..LayerOverrides::default()
    });
}

#[given("I pass the index key \"building\" with a CLI flag")]
fn cli_index_key(#[from(world)] world: &CliWorld) {
    world
        .cli_args
        .borrow_mut()
        .extend(["--index-key".to_owned(), "building".to_owned()]);
}

#[when("I run the convert command")]
fn run_convert_command(#[from(world)] world: &CliWorld) {
    let file_layer = world.config_layer.borrow().clone();
    let env_layer = world.env_layer.borrow().clone();
    let resolved = Cli::try_parse_from(world.invocation("convert"))
        .map_err(CliError::ArgumentParsing)
        .and_then(|cli| match cli.command {
            Command::Convert(args) => merge_layers(args, file_layer, env_layer),
            Command::Schema(_) => panic!("expected convert command"),
        });
    let outcome = resolved.and_then(|config| {
        let mut out = Vec::new();
        execute(&config, &mut out)?;
        world.resolved.replace(Some(config));
        Ok(String::from_utf8(out).expect("utf-8 report"))
    });
    world.outcome.replace(Some(outcome));
}

#[when("I run the schema command")]
fn run_schema_command(#[from(world)] world: &CliWorld) {
    let outcome = Cli::try_parse_from(world.invocation("schema"))
        .map_err(CliError::ArgumentParsing)
        .and_then(|cli| {
            let mut out = Vec::new();
            dispatch(cli.command, &mut out)?;
            Ok(String::from_utf8(out).expect("utf-8 schema"))
        });
    world.outcome.replace(Some(outcome));
}

#[then("the report lists one indexed way")]
fn report_lists_one_way(#[from(world)] world: &CliWorld) {
    assert!(world.output().contains("spatial index: 1 ways"));
}

#[then("the report lists no indexed ways")]
fn report_lists_no_ways(#[from(world)] world: &CliWorld) {
    assert!(world.output().contains("spatial index: 0 ways"));
}

#[then("the database contains the highway way")]
fn database_contains_way(#[from(world)] world: &CliWorld) {
    let connection =
        Connection::open(world.dataset.database().as_std_path()).expect("open database");
    let highway: String = connection
        .query_row(
            "SELECT value FROM way_tags WHERE way_id = 10 AND key = 'highway'",
            [],
            |row| row.get(0),
        )
        .expect("highway tag stored");
    assert_eq!(highway, "residential");
}

#[then("the CLI reports that the \"database\" flag is missing")]
fn reports_missing_database(#[from(world)] world: &CliWorld) {
    world.with_error(|error| match error {
        CliError::MissingArgument { field, .. } => assert_eq!(*field, ARG_DATABASE),
        other => panic!("unexpected error {other:?}"),
    });
}

#[then("the CLI reports that the extract does not exist")]
fn reports_missing_extract(#[from(world)] world: &CliWorld) {
    world.with_error(|error| match error {
        CliError::MissingInputFile { path, .. } => {
            assert_eq!(*path, world.dataset.missing_extract());
        }
        other => panic!("unexpected error {other:?}"),
    });
    assert!(!world.dataset.database().exists());
}

#[then("the resolved configuration combines every layer")]
fn configuration_combines_layers(#[from(world)] world: &CliWorld) {
    let borrowed = world.resolved.borrow();
    let config = borrowed.as_ref().expect("configuration resolved");
    assert_eq!(config.o5m.as_path(), world.dataset.config_extract());
    assert_eq!(config.database, world.dataset.env_database());
    assert_eq!(config.options.index_key, "building");
}

#[then("the schema creates the \"rtree_way_building\" table")]
fn schema_names_table(#[from(world)] world: &CliWorld) {
    assert!(
        world
            .output()
            .contains("CREATE VIRTUAL TABLE rtree_way_building USING rtree")
    );
}

macro_rules! register_cli_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/convert_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: CliWorld) {
            let _ = world;
        }
    };
}

register_cli_scenario!(cli_flag_conversion, "converting an extract with CLI flags");
register_cli_scenario!(rejecting_missing_args, "rejecting missing arguments");
register_cli_scenario!(
    layering_cli_config_env,
    "layering CLI, config file, and environment values"
);
register_cli_scenario!(rejecting_missing_extract, "rejecting a missing extract");
register_cli_scenario!(schema_for_custom_key, "printing the schema for a custom key");
