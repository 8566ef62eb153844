use std::fs;
use std::path::PathBuf;

use cpio_format::{
    parse, Archive, Entry, EntryKind, FileEntry, Header, Ident, Overrides, Writer, TRAILER_NAME,
};

fn file(name: &str, ino: u32, data: &[u8]) -> Entry {
    let mut header = Header::new(name, EntryKind::File);
    header.ino = ino;
    Entry::File(FileEntry::new(header, data.to_vec()))
}

/// Walk the raw stream record by record, returning (name, kind, payload,
/// end offsets) so layout properties can be checked without the reader.
fn walk(data: &[u8]) -> Vec<(String, EntryKind, Vec<u8>, usize, usize)> {
    let mut records = Vec::new();
    let mut offset = 0;
    loop {
        let ((header, namesize), consumed) = parse::parse_header(&data[offset..]).unwrap();
        offset += consumed;
        let (name, consumed) = parse::parse_name(&data[offset..], namesize).unwrap();
        offset += consumed;
        offset += parse::pad_len(offset, 4);
        let header_end = offset;

        let payload = data[offset..offset + header.filesize as usize].to_vec();
        offset += header.filesize as usize;
        offset += parse::pad_len(offset, 4);

        let kind = header.kind().unwrap();
        let done = name == TRAILER_NAME && header.mode == 0;
        records.push((name, kind, payload, header_end, offset));
        if done {
            return records;
        }
    }
}

#[test]
fn filesystem_tree_roundtrips_field_for_field() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir(root.join("bin")).unwrap();
    fs::write(root.join("bin/busybox"), b"#!ELF not really\n").unwrap();
    fs::write(root.join("init"), b"#!/bin/sh\nexec /bin/busybox init\n").unwrap();
    std::os::unix::fs::symlink("busybox", root.join("bin/sh")).unwrap();

    let mut archive = Archive::new();
    let paths: Vec<PathBuf> = vec![
        root.join("bin"),
        root.join("bin/busybox"),
        root.join("bin/sh"),
        root.join("init"),
    ];
    archive.append_paths(&paths, Some(root)).unwrap();
    assert_eq!(
        archive.names().collect::<Vec<_>>(),
        vec!["bin", "bin/busybox", "bin/sh", "init"]
    );

    let data = Writer::new(&archive).to_vec().unwrap();
    let reread = Archive::from_bytes(&data).unwrap();

    assert_eq!(reread.len(), archive.len());
    for entry in archive.iter() {
        let back = reread.get(entry.name()).unwrap();
        assert_eq!(back.header(), entry.header(), "header for {}", entry.name());
        assert_eq!(back.payload(), entry.payload());
        assert_eq!(back.kind(), entry.kind());
    }
}

#[test]
fn every_block_ends_aligned() {
    let mut archive = Archive::new();
    archive.insert(file("a", 1, b"x")).unwrap();
    archive.insert(file("bb", 2, b"seven b")).unwrap();
    archive.insert(file("a/long/nested/path/name", 3, b"12345")).unwrap();

    let data = Writer::new(&archive).to_vec().unwrap();
    for (name, _, _, header_end, payload_end) in walk(&data) {
        assert_eq!(header_end % 4, 0, "header block of {:?}", name);
        assert_eq!(payload_end % 4, 0, "payload block of {:?}", name);
    }
}

#[test]
fn stream_ends_with_trailer_of_kind_none() {
    let mut archive = Archive::new();
    archive.insert(file("only", 1, b"data")).unwrap();

    let data = Writer::new(&archive).to_vec().unwrap();
    let records = walk(&data);
    let (name, kind, payload, _, end) = records.last().unwrap().clone();
    assert_eq!(name, TRAILER_NAME);
    assert_eq!(kind, EntryKind::None);
    assert!(payload.is_empty());
    assert_eq!(end, data.len());
}

#[test]
fn hardlinked_content_is_stored_once() {
    let mut archive = Archive::new();
    for i in 0..10 {
        archive
            .insert(file(&format!("empty{}", i), 100 + i, b""))
            .unwrap();
    }
    archive.insert(file("x1", 200, b"X")).unwrap();
    archive.insert(file("x2", 201, b"X")).unwrap();
    archive.insert(file("x3", 202, b"X")).unwrap();

    let data = Writer::new(&archive).to_vec().unwrap();

    // Naive layout would carry the "X" payload three times; linked layout
    // carries one padded copy plus two empty hardlink headers.
    let mut naive = Vec::new();
    for entry in archive.iter() {
        let mut header = entry.header().clone();
        header.nlink = 1;
        let copies = if header.name().starts_with('x') { 1 } else { 0 };
        header.filesize = copies;
        cpio_format::encode::encode_header(&mut naive, &header).unwrap();
        cpio_format::encode::encode_payload(&mut naive, &vec![b'X'; copies as usize]);
    }
    cpio_format::encode::encode_trailer(&mut naive);
    assert!(data.len() < naive.len());

    let reread = Archive::from_bytes(&data).unwrap();
    let x1 = reread.get("x1").unwrap();
    for name in ["x1", "x2", "x3"] {
        let header = reread.get(name).unwrap().header();
        assert_eq!(header.ino, x1.header().ino);
        assert_eq!(header.nlink, 3);
    }
    assert_eq!(x1.payload(), b"X");
    assert!(reread.get("x2").unwrap().payload().is_empty());
}

#[test]
fn symlink_roundtrips_without_padding_leakage() {
    let mut archive = Archive::new();
    let overrides = Overrides {
        uid: Some(Ident::Id(1000)),
        gid: Some(Ident::Id(1000)),
        mode: Some(0o400),
        ..Default::default()
    };
    archive.set_overrides(overrides);
    archive.add_symlink("link", "target").unwrap();

    let data = Writer::new(&archive).to_vec().unwrap();
    let reread = Archive::from_bytes(&data).unwrap();
    let link = reread.get("link").unwrap();

    assert_eq!(link.kind(), EntryKind::Symlink);
    assert_eq!(link.payload(), b"target");
    assert_eq!(link.header().filesize, 6);
    assert_eq!(link.header().uid, 1000);
    // Symlink permissions are always full, overrides notwithstanding.
    assert_eq!(link.header().permissions().bits(), 0o777);
}

#[test]
fn chardev_roundtrips_device_numbers() {
    let mut archive = Archive::new();
    archive.add_chardev("dev/console", 5, 1).unwrap();

    let data = Writer::new(&archive).to_vec().unwrap();
    let reread = Archive::from_bytes(&data).unwrap();
    let dev = reread.get("dev/console").unwrap();
    assert_eq!(dev.kind(), EntryKind::CharDevice);
    assert_eq!(dev.header().rdevmajor, 5);
    assert_eq!(dev.header().rdevminor, 1);
    assert_eq!(dev.header().filesize, 0);
}

#[test]
fn reproducible_output_is_stable_across_inode_churn() {
    let build = |inos: [u32; 3]| {
        let mut archive = Archive::new();
        archive.set_reproducible(true);
        archive.insert(file("a", inos[0], b"aa")).unwrap();
        archive.insert(file("b", inos[1], b"bb")).unwrap();
        archive.insert(file("c", inos[2], b"cc")).unwrap();
        Writer::new(&archive).to_vec().unwrap()
    };

    // Same content under wildly different host inodes produces identical
    // bytes.
    assert_eq!(build([7, 99, 12345]), build([400, 2, 88]));
}

#[test]
fn compressed_write_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("img.cpio.zst");

    let mut archive = Archive::new();
    archive.insert(file("etc/passwd", 1, b"root:x:0:0::/root:/bin/sh\n")).unwrap();

    #[cfg(feature = "zstd")]
    {
        Writer::with_compression(&archive, "zstd")
            .unwrap()
            .write_path(&path)
            .unwrap();

        let raw = fs::read(&path).unwrap();
        let plain = cpio_format::Compression::Zstd.decompress(&raw).unwrap();
        let reread = Archive::from_bytes(&plain).unwrap();
        assert_eq!(
            reread.get("etc/passwd").unwrap().payload(),
            archive.get("etc/passwd").unwrap().payload()
        );
    }
    #[cfg(not(feature = "zstd"))]
    {
        let err = Writer::with_compression(&archive, "zstd").unwrap_err();
        assert!(matches!(err, cpio_format::Error::UnsupportedCompression(_)));
        let _ = path;
    }
}

#[test]
fn merge_then_remove_keeps_payload_reachable() {
    let mut base = Archive::new();
    base.insert(file("kernel/module.ko", 1, b"\x7fELF")).unwrap();

    let mut overlay = Archive::new();
    overlay.insert(file("firmware/blob", 1, b"\x00\x01")).unwrap();
    overlay.insert(file("kernel/module.alias", 2, b"\x7fELF")).unwrap();

    base.merge(overlay).unwrap();
    // The overlay's ino 1 collided and was reassigned; the equal-content
    // pair became a link group.
    assert_ne!(
        base.get("firmware/blob").unwrap().header().ino,
        base.get("kernel/module.ko").unwrap().header().ino
    );
    assert_eq!(
        base.get("kernel/module.alias").unwrap().header().ino,
        base.get("kernel/module.ko").unwrap().header().ino
    );

    base.remove("kernel/module.ko").unwrap();
    let survivor = base.get("kernel/module.alias").unwrap();
    assert_eq!(survivor.payload(), b"\x7fELF");
    assert_eq!(survivor.header().nlink, 1);

    let data = Writer::new(&base).to_vec().unwrap();
    let reread = Archive::from_bytes(&data).unwrap();
    assert_eq!(reread.get("kernel/module.alias").unwrap().payload(), b"\x7fELF");
}
