// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use autolisp_model::analyzer::annotate;
use autolisp_model::parser::{TreeBuilder, build};
use autolisp_model::{LispDocument, ScopeTree, SymbolBroker, builtin_keywords, parse};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

const ROUTINE: &str = r#";|@Global|;
(defun lib:offset-points (pts dist / result)
  ;; shift every point by dist
  (foreach pt pts
    (setq result (cons (mapcar '(lambda (v) (+ v dist)) pt) result))
  )
  (reverse result)
)

(setq gTolerance 1e-6) ; @Global

(defun c:offset (/ ss idx ent)
  (if (setq ss (ssget '((0 . "LWPOLYLINE"))))
    (progn
      (setq idx 0)
      (repeat (sslength ss)
        (setq ent (ssname ss idx)
              idx (1+ idx))
        (princ (strcat "\nEntity: " (vl-princ-to-string ent)))
      )
    )
  )
  (princ)
)
"#;

fn large_source(copies: usize) -> String {
    let mut text = String::with_capacity(ROUTINE.len() * copies);
    for i in 0..copies {
        text.push_str(&ROUTINE.replace("offset", &format!("offset{i}")));
    }
    text
}

fn benchmark_parse(c: &mut Criterion) {
    c.bench_function("parse_routine", |b| b.iter(|| black_box(parse(black_box(ROUTINE)))));

    let text = large_source(2_000);
    c.bench_function("tree_builder_large", |b| {
        b.iter(|| black_box(TreeBuilder::new(black_box(&text), builtin_keywords()).build()))
    });
}

fn benchmark_annotate(c: &mut Criterion) {
    let text = large_source(2_000);
    c.bench_function("annotate_large", |b| {
        b.iter_batched(
            || build(&text, builtin_keywords()),
            |mut document| black_box(annotate(&mut document)),
            criterion::BatchSize::LargeInput,
        )
    });

    // one form holding every atom; time grows linearly with the item count
    let mut group = c.benchmark_group("annotate_wide_form");
    for items in [10_000usize, 20_000, 40_000] {
        let list: Vec<String> = (0..items).map(|i| format!("item{i}")).collect();
        let wide = format!("(setq table '({})) ; @Global", list.join(" "));
        group.throughput(Throughput::Elements(items as u64));
        group.bench_with_input(BenchmarkId::from_parameter(items), &wide, |b, wide| {
            b.iter_batched(
                || build(wide, builtin_keywords()),
                |mut document| black_box(annotate(&mut document)),
                criterion::BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn benchmark_scope_tree(c: &mut Criterion) {
    let text = large_source(2_000);
    let document = parse(&text);
    c.bench_function("scope_tree_large", |b| {
        b.iter(|| black_box(ScopeTree::build("bench.lsp", black_box(&document), builtin_keywords())))
    });

    let broker = SymbolBroker::new();
    let cached = LispDocument::new("bench.lsp", text.as_str());
    c.bench_function("broker_cached_lookup", |b| {
        b.iter(|| black_box(broker.get_scope_tree(black_box(&cached), false)))
    });
}

criterion_group!(benches, benchmark_parse, benchmark_annotate, benchmark_scope_tree);
criterion_main!(benches);
