use std::collections::BTreeSet;

use fnlab_core::{
    PipelineError, SecretConfig, SystemConfig, Workbench, analyzer::Program,
    ast::StatementKind, decomposer::decompose,
};
use proptest::prelude::*;

fn function_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("f_[a-z0-9]{1,6}", 1..8)
        .prop_map(|names: BTreeSet<String>| names.into_iter().collect())
}

fn render(names: &[String], decorate: bool) -> String {
    let mut source = String::from("import math\nfrom math import sqrt\n\nLIMIT = 10\n\n");
    for (i, name) in names.iter().enumerate() {
        if decorate && i % 2 == 0 {
            source.push_str("@staticmethod\n");
        }
        source.push_str(&format!(
            "def {name}(x, y={i}):\n    if x > LIMIT:\n        return sqrt(x)\n    return x + y\n\n"
        ));
        source.push_str(&format!("print({i})\n\n"));
    }
    source
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_every_def_becomes_a_function_entry(names in function_names(), decorate in any::<bool>()) {
        let elements = decompose(&render(&names, decorate)).unwrap();
        prop_assert_eq!(elements.function_names(), names.clone());
        prop_assert_eq!(elements.imports.len(), 2);
        prop_assert_eq!(elements.globals.len(), 1);
        prop_assert_eq!(elements.others.len(), names.len());

        for name in &names {
            let source = elements.function(name).unwrap();
            let program = Program::parse(source).unwrap();
            let body = &program.module().body;
            prop_assert_eq!(body.len(), 1);
            match &body[0].kind {
                StatementKind::FunctionDef(def) => prop_assert_eq!(&def.name, name),
                other => prop_assert!(false, "expected a def, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_syntax_errors_create_no_session(names in function_names(), cut in 1usize..4) {
        let bench = Workbench::from_config(&SystemConfig::default(), &SecretConfig::default());
        let mut source = render(&names, false);
        source.push_str(&format!("def broken({}\n", "(".repeat(cut)));
        prop_assert!(matches!(bench.submit(&source), Err(PipelineError::Syntax(_))));
        prop_assert_eq!(bench.session_count(), 0);
    }
}
