use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::process::Command; // Run programs
use tempfile;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

fn roundtrip_test(data: &[u8],level: &str) -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let expanded_path = temp_dir.path().join("expanded.bin");
    let compressed_path = temp_dir.path().join("compressed.pfl");
    let restored_path = temp_dir.path().join("restored.bin");
    std::fs::write(&expanded_path,data)?;
    let mut cmd = Command::cargo_bin("packflate")?;
    cmd.arg("compress")
        .arg("-m").arg("deflate")
        .arg("-l").arg(level)
        .arg("-i").arg(&expanded_path)
        .arg("-o").arg(&compressed_path)
        .assert()
        .success();
    let mut cmd = Command::cargo_bin("packflate")?;
    cmd.arg("expand")
        .arg("-m").arg("deflate")
        .arg("-i").arg(&compressed_path)
        .arg("-o").arg(&restored_path)
        .assert()
        .success();
    match (std::fs::read(&expanded_path),std::fs::read(&restored_path)) {
        (Ok(v1),Ok(v2)) => {
            assert_eq!(v1,v2);
        },
        _ => panic!("unable to compare output with reference")
    }
    Ok(())
}

fn test_text() -> Vec<u8> {
    "What a piece of work is man, How noble in reason, how infinite in faculty,\n\
    In form and moving how express and admirable, In action how like an Angel,\n\
    In apprehension how like a god, The beauty of the world, The paragon of animals.\n"
        .repeat(40).into_bytes()
}

#[test]
fn deflate_roundtrip() -> STDRESULT {
    roundtrip_test(&test_text(),"6")
}

#[test]
fn deflate_roundtrip_stored() -> STDRESULT {
    roundtrip_test(&test_text(),"0")
}

#[test]
fn deflate_roundtrip_max_level() -> STDRESULT {
    roundtrip_test(&test_text(),"9")
}

#[test]
fn unknown_method_rejected() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("anything.bin");
    let out_path = temp_dir.path().join("anything.out");
    std::fs::write(&in_path,b"anything")?;
    let mut cmd = Command::cargo_bin("packflate")?;
    cmd.arg("expand")
        .arg("-m").arg("lzss")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&out_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not supported"));
    Ok(())
}
