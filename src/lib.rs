#![warn(missing_docs)]

/*!

Rust library to build and validate BagIt preservation packages, with the
[Tokio async runtime](https://docs.rs/tokio).

A *bag* is a directory or tar archive conforming to the BagIt packaging
format: payload files under `data/`, tag files such as `bagit.txt` and
`bag-info.txt` at the root, and manifests carrying checksums of everything.

# Learn about BagIt

- The [Wikipedia article](https://en.wikipedia.org/wiki/BagIt) for a brief
  explanation of the format
- The spec of the container format: [RFC 8493](https://datatracker.ietf.org/doc/html/rfc8493)
- The [BagIt profiles specification](https://bagit-profiles.github.io/bagit-profiles-specification/)
  for the declarative contract a bag can be checked against

## Build a bag

```no_run
use bagit_engine::{Algorithm, BagItProfile, BagJob, Bagger};

# #[tokio::main]
# async fn main() {
// What the bag must look like: required algorithms, tags, serialization
let profile = BagItProfile::minimal(&[Algorithm::Sha256]);

// What goes in, and where the bag lands; a `.tar` output path produces a
// serialized bag, anything else an on-disk bag directory
let job = BagJob::new(
    vec!["photos".into(), "notes.txt".into()],
    "/somewhere/my_bag.tar",
);

let result = Bagger::new(job, profile).run().await;
assert!(result.succeeded, "{:?}", result.errors);
# }
```

## Validate an existing bag

```no_run
use bagit_engine::{Algorithm, BagItProfile, Validator};

# #[tokio::main]
# async fn main() {
let profile = BagItProfile::minimal(&[Algorithm::Sha256]);

// Tar archives and bag directories are both accepted
let result = Validator::new("/somewhere/my_bag.tar", profile).run().await;

// Valid iff no errors; every individual problem is reported
for error in &result.errors {
    eprintln!("{error}");
}
# }
```

Both engines emit progress events ([`BagEvent`]) over a channel obtained
from `subscribe()`, ending in exactly one terminal event.

*/

mod algorithm;
mod bag_file;
mod bagger;
mod checksum;
mod events;
mod kv;
mod op_result;
mod parse;
mod profile;
mod validator;

/// Possible errors when building and validating bags
pub mod error {
    pub use crate::algorithm::UnsupportedAlgorithm;
    pub use crate::bagger::BagError;
    pub use crate::profile::ProfileError;
    pub use crate::validator::ValidateError;
}

pub use algorithm::Algorithm;
pub use bag_file::{BagItFile, FileMeta, FileType};
pub use bagger::{BagJob, Bagger};
pub use checksum::{Checksum, DigestPipeline};
pub use events::BagEvent;
pub use kv::KeyValueCollection;
pub use op_result::OperationResult;
pub use parse::StreamParser;
pub use profile::{BagItProfile, Serialization, TagDefinition};
pub use validator::Validator;

#[cfg(test)]
mod test {
    use crate::{Algorithm, BagItProfile, BagJob, Bagger, Validator};
    use std::path::Path;
    use tokio::fs;

    /// Packing a file set and validating the result with the same profile
    /// must come back clean, whatever the target kind.
    #[tokio::test]
    async fn round_trip_with_nested_sources_and_two_algorithms() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let workdir = temp_directory.to_path_buf();

        let source = workdir.join("archive_drop");
        fs::create_dir_all(source.join("images/raw")).await.unwrap();
        fs::write(source.join("report.pdf"), b"%PDF-1.4 pretend")
            .await
            .unwrap();
        fs::write(source.join("images/cover.jpg"), b"\xff\xd8\xff jpeg-ish")
            .await
            .unwrap();
        fs::write(source.join("images/raw/frame-0001.dng"), vec![0u8; 4096])
            .await
            .unwrap();

        let mut profile = BagItProfile::minimal(&[Algorithm::Md5, Algorithm::Sha256]);
        profile.tag_manifests_required = vec![Algorithm::Sha256];

        for output in ["nested.tar", "nested_dir"] {
            let output = workdir.join(output);
            let job = BagJob::new(vec![source.clone()], &output);
            let result = Bagger::new(job, profile.clone()).run().await;
            assert!(result.succeeded, "bagging {output:?}: {:?}", result.errors);

            let result = Validator::new(&output, profile.clone()).run().await;
            assert_eq!(
                result.errors,
                Vec::<String>::new(),
                "validating {output:?}"
            );
        }
    }

    #[tokio::test]
    async fn imported_standard_profile_drives_a_full_run() {
        let temp_directory = async_tempfile::TempDir::new().await.unwrap();
        let workdir = temp_directory.to_path_buf();
        fs::write(workdir.join("item.txt"), "content").await.unwrap();

        let mut profile = BagItProfile::from_standard_json(
            r#"{
                "Accept-BagIt-Version": ["0.97"],
                "Serialization": "required",
                "Accept-Serialization": ["application/tar"],
                "Manifests-Required": ["sha256"],
                "Bag-Info": {
                    "Source-Organization": { "required": true }
                }
            }"#,
        )
        .unwrap();
        profile.set_tag_value("bag-info.txt", "Source-Organization", "Example Org");

        let job = BagJob::new(
            vec![workdir.join("item.txt")],
            workdir.join("imported.tar"),
        );
        let result = Bagger::new(job, profile.clone()).run().await;
        assert!(result.succeeded, "{:?}", result.errors);
        assert!(Path::new(&workdir.join("imported.tar")).is_file());

        let result = Validator::new(workdir.join("imported.tar"), profile)
            .run()
            .await;
        assert!(result.succeeded, "{:?}", result.errors);
    }
}
