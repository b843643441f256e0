use handbook_core::data_processor::RawChunk;
use handbook_core::types::{Category, ChunkMetadata, FunctionDoc};
use handbook_text::code::{
    analyze_line, assess_complexity, clean_code, extract_example, extract_function_definitions,
    extract_functions, extract_title,
};
use handbook_text::{clean_text, Categorizer, Complexity, ComplexityFilter, Enricher, QueryExpander};

#[test]
fn clean_text_strips_symbols_and_long_numbers() {
    assert_eq!(clean_text("  G := HammingCode(GF(2), 3);\n\n  "), "G :  HammingCode(GF(2), 3);");
    let cleaned = clean_text("page 12345 of the handbook, 2024 edition");
    assert!(!cleaned.contains("12345"));
    assert!(!cleaned.contains("2024"));
    assert!(cleaned.starts_with("page"));
}

#[test]
fn categorizer_first_matching_group_wins() {
    let c = Categorizer::default();
    assert_eq!(c.categorize("intrinsic HammingCode(K::FldFin, r::RngIntElt) -> Code"), Category::Function);
    assert_eq!(c.categorize("> C := HammingCode(GF(2), 3);"), Category::Example);
    assert_eq!(c.categorize("<expr> ::= term"), Category::Syntax);
    assert_eq!(c.categorize("Algorithm 2 relies on the theorem above"), Category::Algorithm);
    assert_eq!(c.categorize("Theorem 3. Every finite field has prime power order"), Category::Theory);
    assert_eq!(c.categorize("Plain prose about groups"), Category::General);
    assert_eq!(c.categorize(""), Category::General);
}

#[test]
fn categorizer_accepts_injected_rules() {
    let table: &[(Category, &[&str])] = &[(Category::Theory, &["(?i)ring"])];
    let c = Categorizer::from_table(table).expect("rules");
    assert_eq!(c.categorize("Ideals of a Ring"), Category::Theory);
    assert_eq!(c.categorize("intrinsic HammingCode(K)"), Category::General);

    let bad: &[(Category, &[&str])] = &[(Category::Theory, &["(unclosed"])];
    assert!(Categorizer::from_table(bad).is_err());
}

#[test]
fn expander_appends_synonyms_in_token_order() {
    let e = QueryExpander::default();
    assert_eq!(
        e.expand("Hamming code"),
        "Hamming code error correction linear code generator algorithm implementation function linear block"
    );
    assert_eq!(e.expand("unknown words"), "unknown words");
    assert_eq!(e.expand(""), "");
}

#[test]
fn expander_uses_injected_table() {
    let e = QueryExpander::new([("Ring", vec!["ideal", "module"])]);
    assert_eq!(e.expand("ring theory"), "ring theory ideal module");
    assert_eq!(e.expand("Hamming"), "Hamming");
    assert_eq!(e.len(), 1);
}

#[test]
fn extract_functions_unique_in_order() {
    let code = "C := HammingCode(GF(2), 3);\nd := MinimumDistance(C);\nGF(4);";
    assert_eq!(extract_functions(code), vec!["HammingCode", "GF", "MinimumDistance"]);
    assert!(extract_functions("x := 1;").is_empty());
}

#[test]
fn function_definitions_from_intrinsics_and_examples() {
    let content = "intrinsic HammingCode(K::FldFin, r::RngIntElt) -> Code { The Hamming code over K }\n\
                   > HammingCode(GF(2), 3);\n\
                   > Dual(C);";
    let defs = extract_function_definitions(content);
    let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["HammingCode", "Dual"]);
    assert_eq!(defs[0].signature, "HammingCode(K::FldFin, r::RngIntElt)");
    assert_eq!(defs[0].description, "The Hamming code over K");
    assert_eq!(defs[0].category, "intrinsic");
    assert_eq!(defs[1].signature, "Dual(C)");
    assert_eq!(defs[1].examples, vec!["> Dual(C)".to_string()]);

    let doc = defs[1].clone().into_doc(Some("12".into()));
    assert_eq!(doc.function_name, "Dual");
    assert_eq!(doc.chapter.as_deref(), Some("12"));
}

#[test]
fn complexity_levels() {
    assert_eq!(assess_complexity("x := 1;"), Complexity::Basic);
    assert_eq!(assess_complexity("for i in [1..3] do\n print i;\nend for;"), Complexity::Intermediate);
    assert_eq!(assess_complexity("F := Factorization(f);"), Complexity::Advanced);
    assert_eq!(assess_complexity("function f(x)\n  for i in [1..x] do end for;\nend function;"), Complexity::Advanced);
    let long = vec!["x := 1;"; 12].join("\n");
    assert_eq!(assess_complexity(&long), Complexity::Intermediate);
}

#[test]
fn complexity_filter_parses_all() {
    assert!(ComplexityFilter::All.admits(Complexity::Advanced));
    let f: ComplexityFilter = "basic".parse().expect("filter");
    assert!(f.admits(Complexity::Basic));
    assert!(!f.admits(Complexity::Intermediate));
    assert!("expert".parse::<ComplexityFilter>().is_err());
}

#[test]
fn clean_code_and_title() {
    assert_eq!(clean_code("```magma\n> x := 1;\n> y := x + 1;\n```"), "x := 1;\ny := x + 1;");
    assert_eq!(extract_title("> prompt\n\nGenerator matrices\nmore"), "Generator matrices");
    assert_eq!(extract_title("> only prompts"), "MAGMA Example");
}

#[test]
fn example_extracted_from_prompt_line() {
    let content = "Generator matrices of Hamming codes are computed as follows.\n\
                   > G := GeneratorMatrix(HammingCode(GF(2), 3));\n\
                   The result is a 3 by 7 matrix over GF(2).";
    let meta = ChunkMetadata { source: "handbook.txt".into(), page: 12, ..Default::default() };
    let ex = extract_example(content, &meta).expect("example");
    assert_eq!(ex.code, "G := GeneratorMatrix(HammingCode(GF(2), 3));");
    assert_eq!(ex.title, "Generator matrices of Hamming codes are computed as follows.");
    assert_eq!(ex.complexity, Complexity::Basic);
    assert_eq!(ex.page, 12);
    assert!(ex.explanation.contains("The result is a 3 by 7 matrix"));
    assert!(ex.explanation.chars().count() <= 200);

    assert!(extract_example("No code here at all.", &meta).is_none());
}

#[test]
fn analyze_line_describes_assignments_and_calls() {
    assert_eq!(
        analyze_line("C := HammingCode(GF(2), 3);", &[]).as_deref(),
        Some("Assigns `HammingCode(GF(2), 3);` to variable `C`")
    );
    let docs = vec![FunctionDoc {
        function_name: "Dual".into(),
        description: Some("The dual code".into()),
        ..Default::default()
    }];
    assert_eq!(analyze_line("Dual(C);", &docs).as_deref(), Some("Calls `Dual`: The dual code..."));
    assert_eq!(analyze_line("Length(C);", &docs).as_deref(), Some("Calls function `Length`"));
    assert_eq!(analyze_line("print x;", &docs), None);
}

#[test]
fn enricher_derives_metadata() {
    let raw = RawChunk {
        source: "h.txt".into(),
        page: 3,
        chunk_index: 0,
        content: "Chapter 12 Linear Codes\n\n12.3 Hamming Codes\n> C := HammingCode(GF(2), 3);".into(),
    };
    let e = Enricher::default().enrich(&raw);
    let m = &e.chunk.metadata;
    assert_eq!(m.id.as_deref(), Some("h.txt:p3:c0"));
    assert_eq!(m.page, 3);
    assert_eq!(m.category, Category::Example);
    assert!(m.chapter.as_deref().is_some_and(|c| c.starts_with("12 Linear Codes")));
    assert!(m.section.as_deref().is_some_and(|s| s.starts_with("12.3 Hamming Codes")));
    assert_eq!(m.has_code, Some(true));
    assert_eq!(m.has_example, Some(true));
    assert!(m.word_count.is_some_and(|w| w > 0));
    assert_eq!(e.chunk.content, raw.content);
    assert!(!e.content_clean.contains('\n'));
}
