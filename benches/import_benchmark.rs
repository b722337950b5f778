use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use proforma_importer::{
    EnvironmentRegistry, ExecutionEnvironment, ExerciseDraft, FileType, FileTypeRegistry,
    ImporterConfig, ProformaImporter,
};
use rand::{seq::SliceRandom, thread_rng, Rng};
use std::sync::Arc;
use std::thread;

const EXTENSIONS: [&str; 6] = ["java", "py", "rb", "c", "txt", ""];
const CLASSES: [&str; 4] = ["template", "internal", "library", "instruction"];

// Builds a task with `file_count` files, a third of them referenced by tests
fn generate_task(file_count: usize) -> String {
    let mut rng = thread_rng();
    let mut files = String::new();
    let mut filerefs = String::new();

    for id in 0..file_count {
        let extension = EXTENSIONS.choose(&mut rng).unwrap();
        let class = CLASSES.choose(&mut rng).unwrap();
        let depth = rng.gen_range(0..3);
        let mut filename = (0..depth).map(|d| format!("dir{}/", d)).collect::<String>();
        filename.push_str(&format!("file{}", id));
        if !extension.is_empty() {
            filename.push('.');
            filename.push_str(extension);
        }
        let comment = if rng.gen_bool(0.1) { r#" comment="main""# } else { "" };
        files.push_str(&format!(
            r#"<p:file id="{id}" class="{class}" filename="{filename}"{comment}>"#
        ));
        files.push_str(&format!("content of file {id}</p:file>"));
        if id % 3 == 0 {
            filerefs.push_str(&format!(r#"<p:fileref refid="{id}"/>"#));
        }
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<p:task xmlns:p="urn:proforma:task:v1.0.1" xmlns:c="codeharbor">
  <p:description>generated</p:description>
  <p:proglang version="8">Java</p:proglang>
  <p:files>{files}</p:files>
  <p:tests>
    <p:test id="t1">
      <p:test-configuration>
        <p:filerefs>{filerefs}</p:filerefs>
        <c:feedback-message>failed</c:feedback-message>
      </p:test-configuration>
    </p:test>
  </p:tests>
  <p:meta-data><p:title>Generated</p:title></p:meta-data>
</p:task>"#
    )
}

fn importer() -> ProformaImporter<EnvironmentRegistry, FileTypeRegistry> {
    let environments = [ExecutionEnvironment {
        id: 2,
        name: "Java 8".to_string(),
    }]
    .into_iter()
    .collect();
    let file_types = [
        ("Makefile", None),
        ("Java", Some(".java")),
        ("Python", Some(".py")),
        ("C", Some(".c")),
    ]
    .into_iter()
    .enumerate()
    .map(|(id, (name, extension))| FileType {
        id: id as i64,
        name: name.to_string(),
        file_extension: extension.map(str::to_string),
    })
    .collect();
    ProformaImporter::new(environments, file_types, ImporterConfig::default())
}

pub fn import_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("proforma_import");
    let importer = Arc::new(importer());

    for file_count in [10, 100, 1000].iter() {
        let xml = generate_task(*file_count);
        group.bench_with_input(
            BenchmarkId::from_parameter(file_count),
            &xml,
            |b, xml| {
                b.iter(|| {
                    let mut draft = ExerciseDraft::new();
                    importer.import(&mut draft, xml).unwrap();
                    black_box(draft)
                });
            },
        );
    }

    // Concurrent imports sharing one importer, one draft per call
    let xml = Arc::new(generate_task(100));
    group.bench_function("concurrent_4x25", |b| {
        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let importer = Arc::clone(&importer);
                    let xml = Arc::clone(&xml);
                    thread::spawn(move || {
                        for _ in 0..25 {
                            let mut draft = ExerciseDraft::new();
                            importer.import(&mut draft, &xml).unwrap();
                            black_box(draft);
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(benches, import_benchmark);
criterion_main!(benches);
