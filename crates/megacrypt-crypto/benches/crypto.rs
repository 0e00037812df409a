use std::io::Read;

use megacrypt_crypto::{
    decrypt_bytes, encrypt_bytes, generate_file_key, generate_iv, wrap_blocks, EncryptStream,
};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576, 4194304])]
fn bench_encrypt_stream(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| encrypt_bytes(divan::black_box(&data)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576, 4194304])]
fn bench_decrypt_stream(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    let (ciphertext, summary) = encrypt_bytes(&data).unwrap();
    let node_key = summary.node_key();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| decrypt_bytes(divan::black_box(&ciphertext), &node_key).unwrap());
}

// Unaligned request sizes go through the cached-keystream path
#[divan::bench(args = [7, 4096, 65536])]
fn bench_encrypt_read_size(bencher: divan::Bencher, request: usize) {
    let size = 1_048_576;
    let data = make_data(size);
    let file_key = generate_file_key();
    let iv = generate_iv();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            let mut stream =
                EncryptStream::with_key(data.as_slice(), size as u64, file_key.clone(), iv);
            let mut buf = vec![0u8; request];
            while stream.read(&mut buf).unwrap() > 0 {}
            stream.finish().unwrap()
        });
}

#[divan::bench(args = [32, 656])]
fn bench_wrap_blocks(bencher: divan::Bencher, size: usize) {
    let master = [0x42u8; 16];
    let data = make_data(size);
    bencher.bench(|| wrap_blocks(divan::black_box(&data), &master).unwrap());
}

fn main() {
    divan::main();
}
