use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

pub mod trie {
    use brres::trie::TrieGroup;
    use divan::Bencher;

    fn names(count: usize) -> Vec<Vec<u8>> {
        (0..count)
            .map(|i| format!("resource_{i:04}.tex0").into_bytes())
            .collect()
    }

    fn filled(count: usize) -> (TrieGroup, Vec<Vec<u8>>) {
        let names = names(count);
        let mut group = TrieGroup::new();
        for name in &names {
            group.insert(name.as_slice());
        }
        (group, names)
    }

    #[divan::bench(args = [16, 256, 4096])]
    fn insert(bencher: Bencher, count: usize) {
        bencher.with_inputs(|| names(count)).bench_refs(|names| {
            let mut group = TrieGroup::new();
            for name in names.iter() {
                group.insert(name.as_slice());
            }
            divan::black_box(group.len());
        });
    }

    #[divan::bench(args = [16, 256, 4096])]
    fn lookup(bencher: Bencher, count: usize) {
        bencher.with_inputs(|| filled(count)).bench_refs(|(group, names)| {
            for name in names.iter() {
                divan::black_box(group.lookup(name));
            }
        });
    }
}

pub mod build {
    use brres::write::BrresWriter;
    use divan::Bencher;

    #[divan::bench(args = [4, 64])]
    fn flat_container(bencher: Bencher, count: usize) {
        bencher.bench(|| {
            let mut writer = BrresWriter::default();
            for i in 0..count {
                writer
                    .add_file(&format!("file_{i:03}.bin"), vec![0xAB; 0x40])
                    .unwrap();
            }
            divan::black_box(writer.build().unwrap().bytes.len())
        });
    }
}
