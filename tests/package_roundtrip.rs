use ooxpack::opc::blank_presentation;
use ooxpack::zip::compression::{crc32, deflate};
use ooxpack::zip::{
    BuildOptions, CentralDirectoryRecord, CompressionMethod, DOS_EPOCH_DATE, EndOfCentralDirectory,
    LocalFileHeader, build, extract,
};
use ooxpack::{Error, PackageArchive};

fn blank_bytes() -> Vec<u8> {
    let mut package = blank_presentation().unwrap();
    package.to_bytes(&BuildOptions::default()).unwrap()
}

#[test]
fn test_blank_template_extracts() {
    let archive = extract(&blank_bytes()).unwrap();
    let paths = archive.list();
    assert_eq!(paths[0], "[Content_Types].xml");
    for part in ["_rels/.rels", "ppt/presentation.xml", "ppt/theme/theme1.xml", "docProps/core.xml"] {
        assert!(paths.iter().any(|p| p == part), "{} missing from {:?}", part, paths);
    }
    assert!(archive.dirty_paths().is_empty());
}

#[test]
fn test_untouched_archive_rebuilds_byte_for_byte() {
    let bytes = blank_bytes();
    let mut archive = extract(&bytes).unwrap();
    let rebuilt = build(&mut archive, &BuildOptions::with_level(1)).unwrap();
    assert_eq!(rebuilt, bytes);
}

#[test]
fn test_edit_keeps_other_entries_and_order() {
    let bytes = blank_bytes();
    let mut archive = extract(&bytes).unwrap();
    let before = archive.list();
    let theme_raw = archive.entry("ppt/theme/theme1.xml").unwrap().raw().unwrap().to_vec();

    archive.set("docProps/core.xml", b"<cp:coreProperties/>".to_vec()).unwrap();
    assert_eq!(archive.dirty_paths(), vec!["docProps/core.xml"]);

    let rebuilt = build(&mut archive, &BuildOptions::default()).unwrap();
    let again = extract(&rebuilt).unwrap();
    assert_eq!(again.list(), before);
    assert_eq!(again.get_text("docProps/core.xml").unwrap(), "<cp:coreProperties/>");
    assert_eq!(again.entry("ppt/theme/theme1.xml").unwrap().raw().unwrap(), theme_raw.as_slice());
}

#[test]
fn test_set_get_remove() {
    let mut archive = PackageArchive::new();
    archive.set("/ppt//media/./image1.png", vec![0x89, b'P', b'N', b'G']).unwrap();
    assert!(archive.has("ppt/media/image1.png"));
    assert_eq!(archive.get("ppt/media/image1.png").unwrap(), &[0x89, b'P', b'N', b'G']);

    let removed = archive.remove("ppt/media/image1.png").unwrap();
    assert_eq!(removed.path(), "ppt/media/image1.png");
    assert!(archive.is_empty());

    assert!(matches!(archive.get("ppt/media/image1.png"), Err(Error::EntryNotFound(_))));
    assert!(matches!(archive.remove("nope.xml"), Err(Error::EntryNotFound(_))));
    assert!(matches!(archive.set("../outside.xml", vec![]), Err(Error::InvalidPath(_))));
}

#[test]
fn test_file_and_directory_cannot_share_a_path() {
    let mut archive = PackageArchive::new();
    archive.set("ppt/media/", Vec::new()).unwrap();
    let err = archive.set("ppt/media", b"x".to_vec()).unwrap_err();
    assert_eq!(err.code(), "PATH_CONFLICT");
    assert!(archive.entry("ppt/media/").unwrap().is_directory());
}

#[test]
fn test_level_zero_stores_everything() {
    let mut package = blank_presentation().unwrap();
    let bytes = package.to_bytes(&BuildOptions::with_level(0)).unwrap();
    let archive = extract(&bytes).unwrap();
    assert!(archive.entries().iter().all(|e| e.method() == CompressionMethod::Stored));
}

#[test]
fn test_garbage_is_malformed() {
    let cases: [&[u8]; 3] = [b"", b"not a zip at all", &[0u8; 64]];
    for data in cases {
        let err = extract(data).unwrap_err();
        assert_eq!(err.code(), "ZIP_MALFORMED");
    }
}

/// One member of a hand-assembled archive.
struct ForeignMember<'a> {
    name: &'static str,
    content: &'a [u8],
    deflated: bool,
    data_descriptor: bool,
    local_extra: Vec<u8>,
    central_extra: Vec<u8>,
    comment: &'static [u8],
}

/// Extended timestamp extra field (0x5455) with mtime only.
fn timestamp_extra(mtime: u32) -> Vec<u8> {
    let mut extra = vec![0x55, 0x54, 5, 0, 1];
    extra.extend_from_slice(&mtime.to_le_bytes());
    extra
}

/// An archive the way other tools write them: streamed entries with zeroed
/// local sizes and a trailing data descriptor, extra fields, entry comments
/// and no particular name order.
fn foreign_archive(members: &[ForeignMember<'_>], archive_comment: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();
    for member in members {
        let crc = crc32(member.content);
        let payload = if member.deflated {
            deflate(member.name, member.content, 9).unwrap()
        } else {
            member.content.to_vec()
        };
        let method = if member.deflated { 8 } else { 0 };
        let flags = if member.data_descriptor { 0x0008 } else { 0 };
        let lfh_offset = out.len() as u32;

        let (local_crc, local_compressed, local_uncompressed) = if member.data_descriptor {
            (0, 0, 0)
        } else {
            (crc, payload.len() as u32, member.content.len() as u32)
        };
        LocalFileHeader {
            version_needed: 20,
            flags,
            method,
            last_mod_time: 0x6000,
            last_mod_date: DOS_EPOCH_DATE + 0x0421,
            crc32: local_crc,
            compressed_size: local_compressed,
            uncompressed_size: local_uncompressed,
            file_name: member.name.as_bytes().to_vec(),
            extra: member.local_extra.clone(),
        }
        .write_to(&mut out)
        .unwrap();
        out.extend_from_slice(&payload);
        if member.data_descriptor {
            out.extend_from_slice(&0x0807_4b50u32.to_le_bytes());
            out.extend_from_slice(&crc.to_le_bytes());
            out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&(member.content.len() as u32).to_le_bytes());
        }

        central.push(CentralDirectoryRecord {
            version_made_by: 0x031E,
            version_needed: 20,
            flags,
            method,
            last_mod_time: 0x6000,
            last_mod_date: DOS_EPOCH_DATE + 0x0421,
            crc32: crc,
            compressed_size: payload.len() as u32,
            uncompressed_size: member.content.len() as u32,
            disk_number_start: 0,
            internal_attrs: 1,
            external_attrs: 0o100644 << 16,
            lfh_offset,
            file_name: member.name.as_bytes().to_vec(),
            extra: member.central_extra.clone(),
            comment: member.comment.to_vec(),
        });
    }

    let cd_offset = out.len() as u32;
    for record in &central {
        record.write_to(&mut out).unwrap();
    }
    EndOfCentralDirectory {
        disk_number: 0,
        disk_with_cd: 0,
        disk_entries: central.len() as u16,
        total_entries: central.len() as u16,
        cd_size: out.len() as u32 - cd_offset,
        cd_offset,
        comment_len: archive_comment.len() as u16,
    }
    .write_to(&mut out, archive_comment)
    .unwrap();
    out
}

#[test]
fn test_foreign_archive_survives_rebuild() {
    let document = "<w:document><w:body><w:p>Quarterly results</w:p></w:body></w:document>".repeat(20);
    let members = [
        ForeignMember {
            name: "word/document.xml",
            content: document.as_bytes(),
            deflated: true,
            data_descriptor: true,
            local_extra: timestamp_extra(1_700_000_000),
            central_extra: timestamp_extra(1_700_000_000),
            comment: b"main body",
        },
        ForeignMember {
            name: "[Content_Types].xml",
            content: br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
            deflated: false,
            data_descriptor: true,
            local_extra: timestamp_extra(1_600_000_000),
            central_extra: Vec::new(),
            comment: b"",
        },
        ForeignMember {
            name: "docProps/app.xml",
            content: b"<Properties><Application>Writer</Application></Properties>",
            deflated: true,
            data_descriptor: false,
            local_extra: Vec::new(),
            central_extra: timestamp_extra(1_650_000_000),
            comment: b"app properties",
        },
        ForeignMember {
            name: "_rels/.rels",
            content: b"<Relationships/>",
            deflated: false,
            data_descriptor: false,
            local_extra: Vec::new(),
            central_extra: Vec::new(),
            comment: b"",
        },
    ];
    let bytes = foreign_archive(&members, b"written elsewhere");

    let mut archive = extract(&bytes).unwrap();
    assert_eq!(
        archive.list(),
        vec!["word/document.xml", "[Content_Types].xml", "docProps/app.xml", "_rels/.rels"]
    );
    assert_eq!(archive.comment(), b"written elsewhere");

    let rebuilt = build(&mut archive, &BuildOptions::default()).unwrap();
    let again = extract(&rebuilt).unwrap();
    assert_eq!(again.list(), archive.list());
    assert_eq!(again.comment(), b"written elsewhere");
    for member in &members {
        let entry = again.entry(member.name).unwrap();
        assert_eq!(entry.data(), member.content, "{}", member.name);
        assert_eq!(entry.crc32(), crc32(member.content), "{}", member.name);
        let method = if member.deflated {
            CompressionMethod::Deflate
        } else {
            CompressionMethod::Stored
        };
        assert_eq!(entry.method(), method, "{}", member.name);
    }
}
