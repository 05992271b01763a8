mod common;

use classmaker::jvm::class_file::{ConstantsPool, Version};
use classmaker::jvm::code::{BranchInstruction::*, Instruction::*, OrdComparison};
use classmaker::jvm::model::ClassMaker;
use classmaker::jvm::{
    BinaryName, Error, ErrorCategory, FieldAccessFlags, FieldRef, FrameComponent,
    LoadableConstant, MethodAccessFlags, MethodRef, Name, TypeContext,
};
use classmaker::loader::{DefineError, InMemoryLoader, LoaderError, NamePolicy};
use classmaker::Settings;
use common::{FrameKind, ParsedClass, PoolEntry};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Settings that write finished classes under a fresh directory `java` can load them from
fn jvm_settings(name: &str) -> (PathBuf, Settings) {
    let directory =
        std::env::temp_dir().join(format!("classmaker-{}-{}", name, std::process::id()));
    let settings = Settings {
        version: Version::JAVA8,
        debug_output: Some(directory.clone()),
        ..Settings::default()
    };
    (directory, settings)
}

/// Run the `main` of a generated class, returning what it printed
///
/// Returns `None` when there is no `java` on the path.
fn run_java(directory: &Path, class: &str) -> Result<Option<String>, Error> {
    let output = match Command::new("java")
        .arg("-cp")
        .arg(directory)
        .arg(class)
        .output()
    {
        Ok(output) => output,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::warn!("no `java` on the path, not running {}", class);
            return Ok(None);
        }
        Err(err) => return Err(Error::Io(err)),
    };
    assert!(
        output.status.success(),
        "java failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
}

/// Add a `main` which prints the result of every call on its own line
fn add_printing_main<'c>(
    class: &mut ClassMaker<'c>,
    calls: &[(MethodRef<'c>, i32)],
) -> Result<(), Error> {
    let context = class.context();
    let string_array = context.array_of(context.string(), 1)?;
    let main = class.add_method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        "main",
        vec![string_array],
        context.void(),
    )?;
    let code = class.code(main)?;
    for (method, argument) in calls {
        code.push_instruction(GetStatic(FieldRef::system_out(context)))?;
        code.load_constant(LoadableConstant::from(*argument))?;
        code.invoke(method.clone())?;
        code.invoke(MethodRef::println(context, context.int()))?;
    }
    code.push_branch_instruction(Return)
}

fn add_default_constructor(class: &mut ClassMaker) -> Result<(), Error> {
    let object = class.context().object();
    let constructor = class.add_constructor(MethodAccessFlags::PUBLIC, vec![])?;
    let code = class.code(constructor)?;
    code.push_instruction(ALoad(0))?;
    code.invoke(MethodRef::default_init(object))?;
    code.push_branch_instruction(Return)
}

#[test]
fn constants_are_interned_structurally() {
    let mut pool = ConstantsPool::new();

    let a = pool.utf8("a").unwrap();
    assert_eq!(pool.utf8("a").unwrap(), a);
    assert_ne!(pool.utf8("b").unwrap(), a);

    let class_a = pool.class("a").unwrap();
    assert_eq!(pool.class("a").unwrap(), class_a);
    assert_ne!(class_a.0, a.0);

    let int_one = pool.integer(1).unwrap();
    let long_one = pool.long(1).unwrap();
    assert_ne!(int_one, long_one);
    assert_eq!(pool.integer(1).unwrap(), int_one);

    // Positive and negative zero are different constants
    assert_ne!(pool.float(0.0).unwrap(), pool.float(-0.0).unwrap());

    // Longs take two slots
    let before = pool.count();
    pool.long(1).unwrap();
    assert_eq!(pool.count(), before);
    pool.long(2).unwrap();
    assert_eq!(pool.count(), before + 2);
}

#[test]
fn assignability_follows_declared_supertypes() {
    let context = TypeContext::new();
    let name = |name: &str| BinaryName::from_source_name(name).unwrap();

    let shape = context
        .declare_class(&name("geo.Shape"), context.object(), &[], false)
        .unwrap();
    let polygon = context
        .declare_class(&name("geo.Polygon"), shape, &[], false)
        .unwrap();
    let square = context
        .declare_class(&name("geo.Square"), polygon, &[], false)
        .unwrap();

    for ty in [context.int(), context.object(), shape, polygon, square] {
        assert!(ty.is_assignable_from(ty), "{} is not assignable to itself", ty);
    }
    assert!(shape.is_assignable_from(polygon));
    assert!(polygon.is_assignable_from(square));
    assert!(shape.is_assignable_from(square));
    assert!(context.object().is_assignable_from(square));
    assert!(!square.is_assignable_from(shape));
}

#[test]
fn round_trip_through_the_jvm() -> Result<(), Error> {
    init_logging();
    let (directory, settings) = jvm_settings("round-trip");

    let context = TypeContext::new();
    let mut class = ClassMaker::begin(&context, "gen.RoundTrip", None, settings)?;
    add_default_constructor(&mut class)?;

    let answer = class.add_method(MethodAccessFlags::PUBLIC, "answer", vec![], context.int())?;
    let code = class.code(answer)?;
    code.push_instruction(BiPush(42))?;
    code.push_branch_instruction(IReturn)?;
    let answer = class.method_ref(answer)?;

    let string_array = context.array_of(context.string(), 1)?;
    let main = class.add_method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        "main",
        vec![string_array],
        context.void(),
    )?;
    let this_class = class.class_type();
    let code = class.code(main)?;
    code.push_instruction(GetStatic(FieldRef::system_out(&context)))?;
    code.push_instruction(New(this_class))?;
    code.push_instruction(Dup)?;
    code.invoke(MethodRef::default_init(this_class))?;
    code.invoke(answer)?;
    code.invoke(MethodRef::println(&context, context.int()))?;
    code.push_branch_instruction(Return)?;

    let bytes = class.finish()?;
    let parsed = ParsedClass::parse(&bytes).map_err(Error::Io)?;
    assert_eq!(parsed.major_version, 52);
    assert_eq!(parsed.this_class_name(), "gen/RoundTrip");
    assert_eq!(parsed.method("answer").unwrap().descriptor, "()I");
    assert_eq!(
        std::fs::read(directory.join("gen/RoundTrip.class")).map_err(Error::Io)?,
        bytes
    );

    if let Some(output) = run_java(&directory, "gen.RoundTrip")? {
        assert_eq!(output.trim(), "42");
    }
    Ok(())
}

#[test]
fn widened_branches_run_on_the_jvm() -> Result<(), Error> {
    init_logging();
    let (directory, settings) = jvm_settings("widened");
    let context = TypeContext::new();
    let mut class = ClassMaker::begin(&context, "gen.Widened", None, settings)?;
    let static_flags = MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC;

    // iload_0; ifne FAR; nop * 40000; bipush 5; ireturn; FAR: bipush 7; ireturn
    let forward = class.add_method(static_flags, "forward", vec![context.int()], context.int())?;
    let code = class.code(forward)?;
    let far = code.fresh_label();
    code.push_instruction(ILoad(0))?;
    code.push_branch_instruction(If(OrdComparison::NE, far, ()))?;
    for _ in 0..40_000 {
        code.push_instruction(Nop)?;
    }
    code.push_instruction(BiPush(5))?;
    code.push_branch_instruction(IReturn)?;
    code.place_label(far)?;
    code.push_instruction(BiPush(7))?;
    code.push_branch_instruction(IReturn)?;
    let forward = class.method_ref(forward)?;

    // Counts up to its argument, with a loop body too long for a 16-bit jump back to the head
    let count = class.add_method(static_flags, "count", vec![context.int()], context.int())?;
    let code = class.code(count)?;
    let counter = code.allocate_local(context.int())?;
    let head = code.fresh_label();
    let done = code.fresh_label();
    code.push_instruction(IConst0)?;
    code.push_instruction(counter.store())?;
    code.place_label(head)?;
    code.push_instruction(counter.load())?;
    code.push_instruction(ILoad(0))?;
    code.push_branch_instruction(IfICmp(OrdComparison::GE, done, ()))?;
    code.push_instruction(IInc(counter.index, 1))?;
    for _ in 0..40_000 {
        code.push_instruction(Nop)?;
    }
    code.push_branch_instruction(Goto(head))?;
    code.place_label(done)?;
    code.push_instruction(counter.load())?;
    code.push_branch_instruction(IReturn)?;
    let count = class.method_ref(count)?;

    add_printing_main(&mut class, &[(forward, 1), (count, 3)])?;
    let bytes = class.finish()?;

    let parsed = ParsedClass::parse(&bytes).map_err(Error::Io)?;
    for name in ["forward", "count"] {
        let code = parsed.code(parsed.method(name).unwrap()).map_err(Error::Io)?;
        assert!(code.code.contains(&0xc8), "expected a goto_w in {}", name);
    }

    if let Some(output) = run_java(&directory, "gen.Widened")? {
        assert_eq!(output.lines().collect::<Vec<_>>(), vec!["7", "3"]);
    }
    Ok(())
}

#[test]
fn switches_run_on_the_jvm() -> Result<(), Error> {
    init_logging();
    let (directory, settings) = jvm_settings("switches");
    let context = TypeContext::new();
    let mut class = ClassMaker::begin(&context, "gen.Switches", None, settings)?;
    let static_flags = MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC;

    // 1 -> 10, 2 -> 20, 3 -> 30, otherwise -1
    let table = class.add_method(static_flags, "table", vec![context.int()], context.int())?;
    let code = class.code(table)?;
    let cases: Vec<_> = (0..3).map(|_| code.fresh_label()).collect();
    let default = code.fresh_label();
    code.push_instruction(ILoad(0))?;
    code.push_branch_instruction(TableSwitch {
        padding: 0,
        default,
        low: 1,
        targets: cases.clone(),
    })?;
    for (case, result) in cases.into_iter().zip([10, 20, 30]) {
        code.place_label(case)?;
        code.push_instruction(BiPush(result))?;
        code.push_branch_instruction(IReturn)?;
    }
    code.place_label(default)?;
    code.push_instruction(IConstM1)?;
    code.push_branch_instruction(IReturn)?;
    let table = class.method_ref(table)?;

    // Keys are given out of order: 100 -> 1, -5 -> 2, 7 -> 3, otherwise 0
    let lookup = class.add_method(static_flags, "lookup", vec![context.int()], context.int())?;
    let code = class.code(lookup)?;
    let keys = [100, -5, 7];
    let cases: Vec<_> = keys.iter().map(|_| code.fresh_label()).collect();
    let default = code.fresh_label();
    code.push_instruction(ILoad(0))?;
    code.push_branch_instruction(LookupSwitch {
        padding: 0,
        default,
        targets: keys.iter().copied().zip(cases.iter().copied()).collect(),
    })?;
    for (case, result) in cases.into_iter().zip([1, 2, 3]) {
        code.place_label(case)?;
        code.push_instruction(BiPush(result))?;
        code.push_branch_instruction(IReturn)?;
    }
    code.place_label(default)?;
    code.push_instruction(IConst0)?;
    code.push_branch_instruction(IReturn)?;
    let lookup = class.method_ref(lookup)?;

    add_printing_main(
        &mut class,
        &[
            (table.clone(), 2),
            (table.clone(), 3),
            (table, 9),
            (lookup.clone(), -5),
            (lookup.clone(), 100),
            (lookup.clone(), 7),
            (lookup, 8),
        ],
    )?;
    let bytes = class.finish()?;

    // Padding puts the 32-bit operands on a 4-byte boundary
    let parsed = ParsedClass::parse(&bytes).map_err(Error::Io)?;
    let code = parsed.code(parsed.method("table").unwrap()).map_err(Error::Io)?;
    assert_eq!(&code.code[..4], &[0x1a, 0xaa, 0x00, 0x00]);
    let code = parsed.code(parsed.method("lookup").unwrap()).map_err(Error::Io)?;
    assert_eq!(&code.code[..2], &[0x1a, 0xab]);
    let key_at = |pair: usize| {
        let start = 12 + 8 * pair;
        i32::from_be_bytes([
            code.code[start],
            code.code[start + 1],
            code.code[start + 2],
            code.code[start + 3],
        ])
    };
    assert_eq!([key_at(0), key_at(1), key_at(2)], [-5, 7, 100]);

    if let Some(output) = run_java(&directory, "gen.Switches")? {
        assert_eq!(
            output.lines().collect::<Vec<_>>(),
            vec!["20", "30", "-1", "2", "1", "3", "0"]
        );
    }
    Ok(())
}

#[test]
fn static_initializers_run_in_order() -> Result<(), Error> {
    init_logging();
    let (directory, settings) = jvm_settings("init");
    let context = TypeContext::new();
    let mut class = ClassMaker::begin(&context, "gen.Init", None, settings)?;
    class.add_field(FieldAccessFlags::STATIC, context.int(), "counter")?;
    let counter = class.field("counter")?;

    // counter = 1; return
    let clinit = class.add_clinit()?;
    let code = class.code(clinit)?;
    code.push_instruction(IConst1)?;
    code.push_instruction(PutStatic(counter.clone()))?;
    code.push_branch_instruction(Return)?;

    // counter = counter * 10 + 2
    assert_eq!(class.add_clinit()?, clinit);
    let code = class.code(clinit)?;
    code.push_instruction(GetStatic(counter.clone()))?;
    code.push_instruction(BiPush(10))?;
    code.push_instruction(IMul)?;
    code.push_instruction(IConst2)?;
    code.push_instruction(IAdd)?;
    code.push_instruction(PutStatic(counter.clone()))?;

    let string_array = context.array_of(context.string(), 1)?;
    let main = class.add_method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        "main",
        vec![string_array],
        context.void(),
    )?;
    let code = class.code(main)?;
    code.push_instruction(GetStatic(FieldRef::system_out(&context)))?;
    code.push_instruction(GetStatic(counter))?;
    code.invoke(MethodRef::println(&context, context.int()))?;
    code.push_branch_instruction(Return)?;

    let bytes = class.finish()?;
    let parsed = ParsedClass::parse(&bytes).map_err(Error::Io)?;
    let clinits = parsed
        .methods
        .iter()
        .filter(|method| method.name == "<clinit>")
        .count();
    assert_eq!(clinits, 1);

    if let Some(output) = run_java(&directory, "gen.Init")? {
        assert_eq!(output.trim(), "12");
    }
    Ok(())
}

#[test]
fn renaming_leaves_string_constants_alone() -> Result<(), Error> {
    let context = TypeContext::new();
    let mut class = ClassMaker::begin(&context, "p.Before", None, Settings::default())?;
    let name = class.add_method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        "name",
        vec![],
        context.string(),
    )?;
    let code = class.code(name)?;
    code.load_constant(LoadableConstant::from("p/Before"))?;
    code.push_branch_instruction(AReturn)?;

    let bytes = class.finish_renamed("p.After")?;
    let parsed = ParsedClass::parse(&bytes).map_err(Error::Io)?;
    assert_eq!(parsed.this_class_name(), "p/After");
    let literal = parsed.constants.iter().find_map(|constant| match constant {
        Some(PoolEntry::String(utf8)) => Some(parsed.utf8(*utf8)),
        _ => None,
    });
    assert_eq!(literal, Some("p/Before"));

    let names: Vec<&str> = parsed
        .constants
        .iter()
        .filter_map(|constant| match constant {
            Some(PoolEntry::Utf8(string)) => Some(string.as_str()),
            _ => None,
        })
        .collect();
    let mut unique = names.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), names.len(), "duplicate Utf8 entries: {:?}", names);
    Ok(())
}

#[test]
fn widening_is_bounded_by_branch_count() -> Result<(), Error> {
    init_logging();

    let build = |max_widening_passes: Option<usize>| -> Result<Vec<u8>, Error> {
        let context = TypeContext::new();
        let settings = Settings {
            max_widening_passes,
            ..Settings::default()
        };
        let mut class = ClassMaker::begin(&context, "gen.Far", None, settings)?;
        let method = class.add_method(
            MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            "far",
            vec![context.int()],
            context.void(),
        )?;
        let code = class.code(method)?;
        let far = code.fresh_label();
        code.push_instruction(ILoad(0))?;
        code.push_branch_instruction(If(OrdComparison::EQ, far, ()))?;
        for _ in 0..40_000 {
            code.push_instruction(Nop)?;
        }
        code.place_label(far)?;
        code.push_branch_instruction(Return)?;
        class.finish()
    };

    // One branch needs at most one widening pass
    let bytes = build(Some(1))?;
    let parsed = ParsedClass::parse(&bytes).map_err(Error::Io)?;
    let code = parsed.code(parsed.method("far").unwrap()).map_err(Error::Io)?;
    assert!(code.code.contains(&0xc8), "expected a goto_w");

    let err = build(Some(0)).unwrap_err();
    assert!(matches!(err, Error::WideningDidNotConverge { .. }));
    assert_eq!(err.category(), ErrorCategory::Internal);
    Ok(())
}

#[test]
fn compact_frame_encodings() -> Result<(), Error> {
    init_logging();
    let context = TypeContext::new();
    let mut class = ClassMaker::begin(&context, "gen.Frames", None, Settings::default())?;
    let static_flags = MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC;

    // iconst_0; istore_1; iload_0; ifeq L; iinc 1 1; L: return
    let append = class.add_method(static_flags, "append", vec![context.int()], context.void())?;
    let code = class.code(append)?;
    let counter = code.allocate_local(context.int())?;
    let skip = code.fresh_label();
    code.push_instruction(IConst0)?;
    code.push_instruction(counter.store())?;
    code.push_instruction(ILoad(0))?;
    code.push_branch_instruction(If(OrdComparison::EQ, skip, ()))?;
    code.push_instruction(IInc(1, 1))?;
    code.place_label(skip)?;
    code.push_branch_instruction(Return)?;

    // iload_0; ifeq L; nop * 70; L: return
    let distant = class.add_method(static_flags, "distant", vec![context.int()], context.void())?;
    let code = class.code(distant)?;
    let skip = code.fresh_label();
    code.push_instruction(ILoad(0))?;
    code.push_branch_instruction(If(OrdComparison::EQ, skip, ()))?;
    for _ in 0..70 {
        code.push_instruction(Nop)?;
    }
    code.place_label(skip)?;
    code.push_branch_instruction(Return)?;

    let bytes = class.finish()?;
    let parsed = ParsedClass::parse(&bytes).map_err(Error::Io)?;

    let append = parsed.code(parsed.method("append").unwrap()).map_err(Error::Io)?;
    assert_eq!(
        append.frames().map_err(Error::Io)?,
        vec![FrameKind::Append {
            delta: 9,
            appended: 1
        }]
    );
    assert_eq!(append.max_locals, 2);

    let distant = parsed.code(parsed.method("distant").unwrap()).map_err(Error::Io)?;
    assert_eq!(
        distant.frames().map_err(Error::Io)?,
        vec![FrameKind::SameExtended { delta: 74 }]
    );
    Ok(())
}

#[test]
fn finished_classes_stay_finished() -> Result<(), Error> {
    let context = TypeContext::new();
    let mut class = ClassMaker::begin(&context, "gen.Done", None, Settings::default())?;
    let method = class.add_method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        "run",
        vec![],
        context.void(),
    )?;
    class.code(method)?.push_branch_instruction(Return)?;
    class.finish()?;

    for _ in 0..3 {
        let attempts = [
            class.finish().map(|_| ()),
            class
                .add_field(FieldAccessFlags::PUBLIC, context.int(), "late")
                .map(|_| ()),
            class.code(method).map(|code| {
                code.fresh_label();
            }),
            class.add_clinit().map(|_| ()),
        ];
        for attempt in attempts {
            let err = attempt.unwrap_err();
            assert!(matches!(err, Error::ClassFinished));
            assert_eq!(err.category(), ErrorCategory::Usage);
        }
    }
    Ok(())
}

#[test]
fn too_many_fields() -> Result<(), Error> {
    let context = TypeContext::new();
    let mut class = ClassMaker::begin(&context, "gen.Wide", None, Settings::default())?;
    for i in 0..65536 {
        class.add_field(FieldAccessFlags::PUBLIC, context.int(), &format!("f{}", i))?;
    }

    let err = class.finish().unwrap_err();
    assert!(
        matches!(err, Error::TooMany { what: "fields", count: 65536 }),
        "unexpected error: {}",
        err
    );
    assert_eq!(err.category(), ErrorCategory::Capacity);
    Ok(())
}

#[test]
fn mismatched_stacks_at_a_label() -> Result<(), Error> {
    let context = TypeContext::new();
    let mut class = ClassMaker::begin(&context, "gen.Mismatch", None, Settings::default())?;
    let method = class.add_method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        "pick",
        vec![context.int()],
        context.int(),
    )?;
    let code = class.code(method)?;
    let join = code.fresh_label();
    let other = code.fresh_label();

    code.push_instruction(ILoad(0))?;
    code.push_branch_instruction(If(OrdComparison::EQ, other, ()))?;
    code.push_instruction(IConst1)?;
    code.push_branch_instruction(Goto(join))?;

    code.place_label(other)?;
    code.push_instruction(FConst1)?;
    let err = code.push_branch_instruction(Goto(join)).unwrap_err();

    match &err {
        Error::IncompatibleFrames { component, .. } => {
            assert_eq!(*component, FrameComponent::Stack)
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(err.category(), ErrorCategory::Consistency);
    assert!(err.to_string().contains("stack"));
    Ok(())
}

#[test]
fn nest_attributes() -> Result<(), Error> {
    let context = TypeContext::new();
    let mut host = ClassMaker::begin(&context, "gen.Host", None, Settings::default())?;
    let mut inner = host.add_nested_class(Some("Inner"), None)?;

    let inner_bytes = inner.finish()?;
    let host_bytes = host.finish()?;

    let host = ParsedClass::parse(&host_bytes).map_err(Error::Io)?;
    assert!(host.attribute("NestMembers").is_some());
    assert!(host.attribute("NestHost").is_none());
    assert!(host.attribute("InnerClasses").is_some());

    let inner = ParsedClass::parse(&inner_bytes).map_err(Error::Io)?;
    assert_eq!(inner.this_class_name(), "gen/Host$Inner");
    assert!(inner.attribute("NestHost").is_some());
    assert!(inner.attribute("InnerClasses").is_some());
    Ok(())
}

#[test]
fn defining_through_a_loader() -> Result<(), DefineError> {
    init_logging();
    let loader = InMemoryLoader::new();

    let context = TypeContext::new();
    let mut first = ClassMaker::begin(&context, "gen.Widget", None, Settings::default())?;
    add_default_constructor(&mut first)?;
    let loaded = first.finish_into(&loader, NamePolicy::Exact)?;
    assert_eq!(loaded.name.as_str(), "gen/Widget");

    let context = TypeContext::new();
    let mut second = ClassMaker::begin(&context, "gen.Widget", None, Settings::default())?;
    add_default_constructor(&mut second)?;
    match second.finish_into(&loader, NamePolicy::Exact) {
        Err(DefineError::Loader(LoaderError::NameConflict(_))) => (),
        other => panic!("expected a name conflict, got {:?}", other.map(|class| class.name)),
    }

    let context = TypeContext::new();
    let mut third = ClassMaker::begin(&context, "gen.Widget", None, Settings::default())?;
    add_default_constructor(&mut third)?;
    let renamed = third.finish_into(&loader, NamePolicy::Unique)?;
    assert!(renamed.name.as_str().starts_with("gen/Widget$"));

    let parsed = ParsedClass::parse(&renamed.bytes).map_err(Error::Io)?;
    assert_eq!(parsed.this_class_name(), renamed.name.as_str());
    assert_eq!(loader.defined_names().len(), 2);
    Ok(())
}
