//! Mod lifecycle tests
//!
//! Tests for validation, dependency checks, scheduling, loading,
//! unloading, disabling and failure reporting.

mod common;

use common::*;
use parking_lot::Mutex;
use std::sync::Arc;

use mod_loader::config::LoaderConfig;
use mod_loader::mods::{
    FailureKind, LifecycleState, LoadFailureKind, ModError, Phase, UnloadCause,
};

#[test]
fn test_invalid_required_mod_cascades() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &scripted_information("RequiredMods = [\"Beta\"]"));
    fixture.add_script("Alpha", "main", Fault::None);
    fixture.create_mod("Beta", "Author = \"tester\"\n");

    let mut manager = fixture.manager();
    let notices = Arc::new(Mutex::new(Vec::new()));
    let _sub = {
        let notices = Arc::clone(&notices);
        manager.failures().subscribe(move |_, notice| {
            notices.lock().push(notice.kind);
            Ok(())
        })
    };

    assert_eq!(manager.load_all().unwrap(), 0);

    let report = manager.report();
    assert!(report.contains(FailureKind::InvalidSetup, "Beta"));
    assert!(report.contains(FailureKind::Cascade, "Alpha"));
    assert!(report.loading_failures().is_empty());
    assert!(manager.list_mods().is_empty());
    assert!(fixture.calls().is_empty());
    assert_eq!(
        *notices.lock(),
        vec![FailureKind::InvalidSetup, FailureKind::Cascade]
    );

    // Already notified entries are not published again
    manager.load_all().unwrap();
    assert_eq!(notices.lock().len(), 2);
}

#[test]
fn test_load_after_orders_loads() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &scripted_information("LoadAfter = [\"Beta\"]"));
    fixture.add_script("Alpha", "main", Fault::None);
    fixture.create_mod("Beta", &scripted_information(""));
    fixture.add_script("Beta", "main", Fault::None);

    let mut manager = fixture.manager();
    assert_eq!(manager.load_all().unwrap(), 2);

    assert_eq!(manager.list_mods(), vec!["Beta".to_string(), "Alpha".to_string()]);
    assert_eq!(
        fixture.calls_of(Phase::Initiate),
        vec!["Beta.main:Initiate", "Alpha.main:Initiate"]
    );
    assert_eq!(manager.get_mod_state("Alpha"), Some(LifecycleState::Started));
}

#[test]
fn test_load_before_orders_loads() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Delta", &information("1.0.0", ""));
    fixture.create_mod("Gamma", &information("1.0.0", "LoadBefore = [\"Delta\"]"));

    let mut manager = fixture.manager();
    manager.load_all().unwrap();
    assert_eq!(manager.list_mods(), vec!["Gamma".to_string(), "Delta".to_string()]);
}

#[test]
fn test_required_mod_loads_first() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &information("1.0.0", "RequiredMods = [\"Beta\"]"));
    fixture.create_mod("Beta", &information("2.1", ""));

    let mut manager = fixture.manager();
    manager.load_all().unwrap();
    assert_eq!(manager.list_mods(), vec!["Beta".to_string(), "Alpha".to_string()]);
}

#[test]
fn test_unsatisfiable_load_order_needs_force() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &information("1.0.0", "LoadAfter = [\"Ghost\"]"));

    let mut manager = fixture.manager();
    assert_eq!(manager.load_all().unwrap(), 0);
    assert!(manager.list_mods().is_empty());

    assert_eq!(manager.force_load_all().unwrap(), 1);
    assert_eq!(manager.list_mods(), vec!["Alpha".to_string()]);
}

#[test]
fn test_setup_checks_disable_without_cascade() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &information("1.0.0", "RequiredMods = [\"Ghost\"]"));
    fixture.create_mod("Beta", &information("1.0.0", "IncompatibleMods = [\"Delta\"]"));
    fixture.create_mod(
        "Gamma",
        &information(
            "1.0.0",
            "[[Compatibility]]\nNamespace = \"Delta\"\nLowestVersion = \"2.0.0\"",
        ),
    );
    fixture.create_mod("Delta", &information("1.5.0", ""));
    fixture.create_mod("Epsilon", &information("1.0.0", "RequiredMods = [\"Gamma\"]"));

    let mut manager = fixture.manager();
    manager.load_all().unwrap();

    let report = manager.report();
    for ns in ["Alpha", "Beta", "Gamma"] {
        assert!(report.contains(FailureKind::InvalidSetup, ns), "{} not reported", ns);
    }
    assert!(report.contains(FailureKind::Cascade, "Epsilon"));
    assert_eq!(manager.list_mods(), vec!["Delta".to_string()]);
}

#[test]
fn test_requirement_cycle_is_invalid_setup() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &information("1.0.0", "RequiredMods = [\"Beta\"]"));
    fixture.create_mod("Beta", &information("1.0.0", "RequiredMods = [\"Alpha\"]"));
    fixture.create_mod("Gamma", &information("1.0.0", "RequiredMods = [\"Alpha\"]"));

    let mut manager = fixture.manager();
    manager.load_all().unwrap();
    let report = manager.report();
    assert!(report.contains(FailureKind::InvalidSetup, "Alpha"));
    assert!(report.contains(FailureKind::InvalidSetup, "Beta"));

    // Gamma only requires a cycle member
    assert!(!report.contains(FailureKind::InvalidSetup, "Gamma"));
    assert!(report.contains(FailureKind::Cascade, "Gamma"));
    assert!(manager.registry().get("Gamma").unwrap().is_blocked());
}

#[test]
fn test_compatibility_ignores_mod_with_invalid_information() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod(
        "Alpha",
        &information(
            "1.0.0",
            "[[Compatibility]]\nNamespace = \"Beta\"\nLowestVersion = \"1.0.0\"",
        ),
    );
    fixture.create_mod("Beta", &information("2.0.0", "Rating = \"Questionable\""));

    let mut manager = fixture.manager();
    assert_eq!(manager.load_all().unwrap(), 1);

    let report = manager.report();
    assert!(report.contains(FailureKind::InvalidSetup, "Beta"));
    assert!(!report.contains(FailureKind::InvalidSetup, "Alpha"));
    assert_eq!(manager.list_mods(), vec!["Alpha".to_string()]);
}

#[test]
fn test_hook_failure_disables_without_rollback() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &scripted_information(""));
    fixture.add_script("Alpha", "a_first", Fault::None);
    fixture.add_script("Alpha", "b_second", Fault::FailOn(Phase::Start));
    fixture.create_mod("Dependent", &information("1.0.0", "RequiredMods = [\"Alpha\"]"));

    let mut manager = fixture.manager();
    assert_eq!(manager.load_all().unwrap(), 0);

    let alpha = manager.registry().get("Alpha").unwrap();
    assert!(alpha.is_blocked());
    assert!(alpha.flags().initiated());
    assert!(!alpha.flags().started());
    assert!(!alpha.flags().loading());
    assert_eq!(alpha.state(), LifecycleState::Starting);

    let report = manager.report();
    assert_eq!(report.loading_failures().len(), 1);
    assert!(report.loading_failures()[0].reason.contains("Start hook of module b_second"));
    assert!(report.contains(FailureKind::Cascade, "Dependent"));

    // No rollback and no unload on failure
    assert!(fixture.calls_of(Phase::Stop).is_empty());

    // Shutdown still runs the unload arm for the partially loaded mod
    manager.shutdown();
    assert_eq!(
        fixture.calls_of(Phase::Unload),
        vec!["Alpha.a_first:Unload", "Alpha.b_second:Unload"]
    );
    assert_eq!(manager.get_mod_state("Alpha"), Some(LifecycleState::NotLoaded));
}

#[test]
fn test_panicking_hook_is_contained() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &scripted_information(""));
    fixture.add_script("Alpha", "main", Fault::PanicOn(Phase::Initiate));
    fixture.create_mod("Beta", &information("1.0.0", ""));

    let mut manager = fixture.manager();
    assert_eq!(manager.load_all().unwrap(), 1);

    let failures = manager.report().loading_failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].reason.contains("Initiate exploded"));
    assert_eq!(manager.list_mods(), vec!["Beta".to_string()]);
}

#[test]
fn test_missing_module_fails_import() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &scripted_information(""));
    // Script on disk, but nothing registered to import it
    std::fs::create_dir_all(fixture.mod_dir("Alpha").join("Scripts")).unwrap();
    std::fs::write(fixture.mod_dir("Alpha").join("Scripts/main.py"), "").unwrap();

    let mut manager = fixture.manager();
    manager.load_all().unwrap();

    let alpha = manager.registry().get("Alpha").unwrap();
    assert!(alpha.is_blocked());
    assert!(alpha.flags().imported());
    assert!(manager.report().loading_failures()[0]
        .reason
        .contains("import of module main failed"));
}

#[test]
fn test_unload_is_best_effort() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &scripted_information(""));
    fixture.add_script("Alpha", "a_first", Fault::FailOn(Phase::Stop));
    fixture.add_script("Alpha", "b_second", Fault::None);

    let mut manager = fixture.manager();
    manager.load_all().unwrap();

    let unloaded = Arc::new(Mutex::new(Vec::new()));
    let _sub = {
        let unloaded = Arc::clone(&unloaded);
        manager.mod_unloaded().subscribe(move |_, args| {
            unloaded.lock().push((args.namespace.clone(), args.cause));
            Ok(())
        })
    };

    let failures = manager.unload_mod("Alpha").unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(fixture.calls_of(Phase::Unload).len(), 2);
    assert_eq!(fixture.calls_of(Phase::StopEarly).len(), 2);
    assert_eq!(manager.get_mod_state("Alpha"), Some(LifecycleState::NotLoaded));
    assert_eq!(
        *unloaded.lock(),
        vec![("Alpha".to_string(), UnloadCause::Normal)]
    );

    assert!(matches!(manager.unload_mod("Alpha"), Err(ModError::NotUnloadable(_))));
    assert_eq!(manager.load_mod("Alpha", false), Err(LoadFailureKind::AlreadyLoaded));
}

#[test]
fn test_disable_unloads_and_cascades_once() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &scripted_information("RequiredMods = [\"Beta\"]"));
    fixture.add_script("Alpha", "main", Fault::None);
    fixture.create_mod("Beta", &scripted_information(""));
    fixture.add_script("Beta", "main", Fault::None);

    let mut manager = fixture.manager();
    assert_eq!(manager.load_all().unwrap(), 2);

    manager.disable_mod("Beta", true).unwrap();
    assert!(manager.registry().get("Beta").unwrap().is_blocked());
    assert!(manager.registry().get("Alpha").unwrap().is_blocked());
    // Dependents stop before the mod they require
    assert_eq!(
        fixture.calls_of(Phase::Stop),
        vec!["Alpha.main:Stop", "Beta.main:Stop"]
    );
    assert_eq!(
        fixture.calls_of(Phase::Unload),
        vec!["Alpha.main:Unload", "Beta.main:Unload"]
    );
    assert_eq!(manager.report().cascade_failures().len(), 1);

    // Disabling again changes nothing
    manager.disable_mod("Beta", true).unwrap();
    manager.disable_mod("Alpha", false).unwrap();
    assert_eq!(fixture.calls_of(Phase::Unload).len(), 2);
    assert_eq!(manager.report().cascade_failures().len(), 1);
    assert_eq!(manager.load_mod("Beta", true), Err(LoadFailureKind::Blocked));
}

#[test]
fn test_disable_without_cascade_leaves_dependents() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &information("1.0.0", "RequiredMods = [\"Beta\"]"));
    fixture.create_mod("Beta", &information("1.0.0", ""));

    let mut manager = fixture.manager();
    manager.prepare();
    manager.disable_mod("Beta", false).unwrap();

    assert!(!manager.registry().get("Alpha").unwrap().is_blocked());
    assert_eq!(manager.load_mod("Alpha", true), Err(LoadFailureKind::NotReady));
}

#[test]
fn test_load_all_is_not_reentrant() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &information("1.0.0", ""));

    let mut manager = fixture.manager();
    let run = manager.scheduler().begin_run().unwrap();
    assert!(matches!(manager.load_all(), Err(ModError::LoadAllInProgress)));
    drop(run);
    assert_eq!(manager.load_all().unwrap(), 1);
}

#[test]
fn test_on_demand_load_triggers_auto_scheduling() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &information("1.0.0", "LoadAfter = [\"Beta\"]"));
    fixture.create_mod("Beta", &information("1.0.0", ""));

    let mut manager = fixture.manager();
    assert_eq!(
        manager.load_mod("Alpha", false),
        Err(LoadFailureKind::PrerequisitesNotLoaded)
    );

    manager.load_mod("Beta", false).unwrap();
    assert_eq!(manager.list_mods(), vec!["Beta".to_string(), "Alpha".to_string()]);
}

#[test]
fn test_paused_auto_load_loads_only_requested_mod() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &information("1.0.0", "LoadAfter = [\"Beta\"]"));
    fixture.create_mod("Beta", &information("1.0.0", ""));

    let mut manager = fixture.manager();
    manager.pause_auto_load();
    manager.load_mod("Beta", false).unwrap();
    assert_eq!(manager.list_mods(), vec!["Beta".to_string()]);

    manager.unpause_auto_load();
    manager.load_all().unwrap();
    assert_eq!(manager.list_mods(), vec!["Beta".to_string(), "Alpha".to_string()]);
}

#[test]
fn test_unsafe_on_demand_load() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &information("1.0.0", "LoadAfter = [\"Ghost\"]"));

    let mut manager = fixture.manager();
    manager.load_mod("Alpha", true).unwrap();
    assert_eq!(manager.list_mods(), vec!["Alpha".to_string()]);
}

#[test]
fn test_auto_load_opt_out() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &information("1.0.0", ""));
    fixture.create_mod("Beta", &information("1.0.0", ""));
    fixture.create_mod("Gamma", &information("1.0.0", ""));

    let config = LoaderConfig {
        mods_dir: fixture.mods_dir.clone(),
        disabled_auto_load: vec!["Gamma".to_string()],
        ..LoaderConfig::default()
    };
    let mut manager = fixture.manager_with(config);
    manager.disable_mod_auto_load("Alpha").unwrap();

    manager.load_all().unwrap();
    assert_eq!(manager.list_mods(), vec!["Beta".to_string()]);

    manager.enable_mod_auto_load("Alpha").unwrap();
    manager.load_all().unwrap();
    assert_eq!(manager.list_mods(), vec!["Beta".to_string(), "Alpha".to_string()]);

    manager.load_mod("Gamma", false).unwrap();
    assert_eq!(manager.list_mods().len(), 3);
}

#[test]
fn test_foreign_controller_is_respected() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod_with_controller("Foreign", "Other", &information("1.0.0", ""));
    fixture.create_mod("Alpha", &information("1.0.0", "RequiredMods = [\"Foreign\"]"));

    let mut manager = fixture.manager();
    manager.load_all().unwrap();

    assert!(manager.list_mods().is_empty());
    assert_eq!(manager.load_mod("Foreign", true), Err(LoadFailureKind::NotControlled));
    assert!(matches!(
        manager.disable_mod("Foreign", true),
        Err(ModError::NotControlled { .. })
    ));
    // Alpha waits for a mod another loader controls; it is not a failure
    assert!(manager.report().is_empty());
}

#[test]
fn test_reload_is_unsupported() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &information("1.0.0", ""));

    let mut manager = fixture.manager();
    manager.load_all().unwrap();
    assert!(matches!(
        manager.reload_mod("Alpha"),
        Err(ModError::ReloadUnsupported(ns)) if ns == "Alpha"
    ));
    assert!(matches!(manager.reload_mod("Ghost"), Err(ModError::ModNotFound(_))));
}

#[test]
fn test_shutdown_unloads_in_reverse_order() {
    let mut fixture = ModTestFixture::new().unwrap();
    fixture.create_mod("Alpha", &scripted_information("RequiredMods = [\"Beta\"]"));
    fixture.add_script("Alpha", "main", Fault::None);
    fixture.create_mod("Beta", &scripted_information(""));
    fixture.add_script("Beta", "main", Fault::None);

    let mut manager = fixture.manager();

    let loaded = Arc::new(Mutex::new(Vec::new()));
    let _sub = {
        let loaded = Arc::clone(&loaded);
        manager.mod_loaded().subscribe(move |owner, args| {
            loaded.lock().push(format!("{}:{}", owner, args.namespace));
            Ok(())
        })
    };

    manager.load_all().unwrap();
    assert_eq!(*loaded.lock(), vec!["Main:Beta", "Main:Alpha"]);

    manager.shutdown();
    assert_eq!(
        fixture.calls_of(Phase::Unload),
        vec!["Alpha.main:Unload", "Beta.main:Unload"]
    );
    assert!(fixture.calls().iter().any(|c| c == "Alpha.main:Exiting"));
}
