use crate::error::{NupdError, Result};
use quick_xml::Reader;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::Event;
use regex::Regex;
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

/// Elements that declare a package dependency: `PackageReference` in project
/// files and `PackageVersion` in centrally managed `Directory.Packages.props`.
pub const DECLARATION_ELEMENTS: &[&str] = &["PackageReference", "PackageVersion"];

const NAME_ATTRIBUTE: &str = "Include";
const VERSION_ATTRIBUTE: &str = "Version";

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s([A-Za-z_][\w.:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute pattern is valid")
});

/// A dependency declared in a build file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDeclaration {
    pub name: String,
    pub version: String,
}

/// A declaration together with the byte range of its raw `Version` value.
#[derive(Debug, Clone)]
struct LocatedDeclaration {
    declaration: DependencyDeclaration,
    version_span: Range<usize>,
}

/// ProjectFileStore reads and rewrites dependency declarations in build files.
///
/// Writes touch only the bytes of one `Version` attribute value; everything
/// else in the file, including quoting, whitespace and comments, is kept.
pub struct ProjectFileStore;

impl ProjectFileStore {
    /// All declarations in document order. Duplicated names are returned as-is.
    pub fn read_declarations(path: &Path) -> Result<Vec<DependencyDeclaration>> {
        let content = fs::read_to_string(path)?;
        let located = locate_declarations(&content).map_err(|message| NupdError::XmlParse {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(located.into_iter().map(|l| l.declaration).collect())
    }

    /// Version of the first declaration named exactly `package`.
    pub fn read_declared_version(path: &Path, package: &str) -> Result<String> {
        Self::read_declarations(path)?
            .into_iter()
            .find(|d| d.name == package)
            .map(|d| d.version)
            .ok_or_else(|| NupdError::DeclarationNotFound {
                path: path.to_path_buf(),
                package: package.to_string(),
            })
    }

    /// Rewrites the version of the first declaration named exactly `package`.
    ///
    /// Returns `Ok(false)` without touching the file when there is no such
    /// declaration.
    pub fn write_declared_version(path: &Path, package: &str, new_version: &str) -> Result<bool> {
        let content = fs::read_to_string(path)?;
        let updated = replace_declared_version(&content, package, new_version).map_err(
            |message| NupdError::XmlParse {
                path: path.to_path_buf(),
                message,
            },
        )?;

        match updated {
            Some(updated) => {
                fs::write(path, updated)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Returns the new document text, or `None` when `package` is not declared.
pub fn replace_declared_version(
    content: &str,
    package: &str,
    new_version: &str,
) -> std::result::Result<Option<String>, String> {
    let located = locate_declarations(content)?;
    let Some(target) = located.iter().find(|l| l.declaration.name == package) else {
        return Ok(None);
    };

    let span = target.version_span.clone();
    let mut updated = String::with_capacity(content.len() + new_version.len());
    updated.push_str(&content[..span.start]);
    updated.push_str(&escape(new_version));
    updated.push_str(&content[span.end..]);
    Ok(Some(updated))
}

fn locate_declarations(content: &str) -> std::result::Result<Vec<LocatedDeclaration>, String> {
    // Offsets are computed against the text after the byte order mark.
    let (body, base) = match content.strip_prefix('\u{feff}') {
        Some(rest) => (rest, '\u{feff}'.len_utf8()),
        None => (content, 0),
    };

    let mut reader = Reader::from_str(body);
    let mut found = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML parsing error: {e}"))?;

        match event {
            Event::Start(e) | Event::Empty(e) => {
                let local_name = e.local_name();
                let is_declaration = DECLARATION_ELEMENTS
                    .iter()
                    .any(|element| element.as_bytes() == local_name.as_ref());
                if !is_declaration {
                    continue;
                }

                // The reader has just consumed the closing `>` of this tag; `<`
                // cannot occur inside attribute values, so the last `<` before
                // that position opens the tag.
                let tag_end = usize::try_from(reader.buffer_position())
                    .map_err(|_| "document too large".to_string())?
                    .min(body.len());
                let Some(tag_start) = body[..tag_end].rfind('<') else {
                    continue;
                };

                if let Some(declaration) = parse_tag(&body[tag_start..tag_end], base + tag_start) {
                    found.push(declaration);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found)
}

fn parse_tag(tag: &str, offset: usize) -> Option<LocatedDeclaration> {
    let mut name = None;
    let mut version = None;

    for captures in ATTRIBUTE.captures_iter(tag) {
        let Some(key) = captures.get(1) else {
            continue;
        };
        let Some(value) = captures.get(2).or_else(|| captures.get(3)) else {
            continue;
        };

        // MSBuild attribute names are case-insensitive; the first occurrence wins.
        if key.as_str().eq_ignore_ascii_case(NAME_ATTRIBUTE) && name.is_none() {
            name = Some(decode(value.as_str()));
        } else if key.as_str().eq_ignore_ascii_case(VERSION_ATTRIBUTE) && version.is_none() {
            version = Some((decode(value.as_str()), value.range()));
        }
    }

    let name = name?.trim().to_string();
    let (version, span) = version?;
    if name.is_empty() {
        return None;
    }

    Some(LocatedDeclaration {
        declaration: DependencyDeclaration { name, version },
        version_span: (span.start + offset)..(span.end + offset),
    })
}

fn decode(raw: &str) -> String {
    unescape(raw)
        .map(|value| value.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PROJECT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project Sdk="Microsoft.NET.Sdk">
  <!-- <PackageReference Include="CivilGeo.Commented" Version="0.0.1" /> -->
  <PropertyGroup>
    <TargetFramework>net8.0</TargetFramework>
  </PropertyGroup>
  <ItemGroup>
    <PackageReference Include="CivilGeo.Grading" Version="3.1.0" />
    <PackageReference   Include='Newtonsoft.Json'   Version = '13.0.1' PrivateAssets="all"/>
    <PackageReference Include="CivilGeo.Core" Version="1.0.0">
      <IncludeAssets>runtime</IncludeAssets>
    </PackageReference>
    <PackageReference Include="CivilGeo.NoVersion" />
  </ItemGroup>
</Project>
"#;

    #[test]
    fn locates_declarations_in_document_order() {
        let found: Vec<_> = locate_declarations(PROJECT)
            .unwrap()
            .into_iter()
            .map(|l| l.declaration)
            .collect();

        assert_eq!(
            found,
            vec![
                DependencyDeclaration {
                    name: "CivilGeo.Grading".into(),
                    version: "3.1.0".into()
                },
                DependencyDeclaration {
                    name: "Newtonsoft.Json".into(),
                    version: "13.0.1".into()
                },
                DependencyDeclaration {
                    name: "CivilGeo.Core".into(),
                    version: "1.0.0".into()
                },
            ]
        );
    }

    #[test]
    fn round_trip_write_changes_only_the_version_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Grading.csproj");
        fs::write(&path, PROJECT).unwrap();

        assert!(ProjectFileStore::write_declared_version(&path, "CivilGeo.Grading", "3.2.0").unwrap());

        assert_eq!(
            ProjectFileStore::read_declared_version(&path, "CivilGeo.Grading").unwrap(),
            "3.2.0"
        );
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            PROJECT.replace(
                r#"Include="CivilGeo.Grading" Version="3.1.0""#,
                r#"Include="CivilGeo.Grading" Version="3.2.0""#
            )
        );
    }

    #[test]
    fn preserves_single_quotes_and_spacing() {
        let updated = replace_declared_version(PROJECT, "Newtonsoft.Json", "13.0.3")
            .unwrap()
            .unwrap();
        assert!(updated.contains(
            r#"<PackageReference   Include='Newtonsoft.Json'   Version = '13.0.3' PrivateAssets="all"/>"#
        ));
    }

    #[test]
    fn handles_non_empty_elements() {
        let updated = replace_declared_version(PROJECT, "CivilGeo.Core", "1.1.0")
            .unwrap()
            .unwrap();
        assert!(updated.contains(r#"<PackageReference Include="CivilGeo.Core" Version="1.1.0">"#));
        assert!(updated.contains("<IncludeAssets>runtime</IncludeAssets>"));
    }

    #[test]
    fn ignores_commented_out_references() {
        assert!(replace_declared_version(PROJECT, "CivilGeo.Commented", "9.9.9")
            .unwrap()
            .is_none());
    }

    #[test]
    fn name_lookup_is_exact() {
        assert!(replace_declared_version(PROJECT, "civilgeo.grading", "9.9.9")
            .unwrap()
            .is_none());
    }

    #[test]
    fn first_duplicate_wins() {
        let content = r#"<Project>
  <ItemGroup Condition="'$(TargetFramework)' == 'net48'">
    <PackageReference Include="CivilGeo.Core" Version="1.0.0" />
  </ItemGroup>
  <ItemGroup>
    <PackageReference Include="CivilGeo.Core" Version="0.9.0" />
  </ItemGroup>
</Project>"#;
        let updated = replace_declared_version(content, "CivilGeo.Core", "2.0.0")
            .unwrap()
            .unwrap();
        assert!(updated.contains(r#"Version="2.0.0""#));
        assert!(updated.contains(r#"Version="0.9.0""#));
    }

    #[test]
    fn attribute_names_are_case_insensitive() {
        let content = r#"<Project><ItemGroup><PackageReference include="CivilGeo.Core" version="1.0.0" /></ItemGroup></Project>"#;
        let found = locate_declarations(content).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].declaration.name, "CivilGeo.Core");
    }

    #[test]
    fn reads_central_package_versions() {
        let content = r#"<Project>
  <ItemGroup>
    <PackageVersion Include="CivilGeo.Hydraulics" Version="4.0.0" />
  </ItemGroup>
</Project>"#;
        let updated = replace_declared_version(content, "CivilGeo.Hydraulics", "4.1.0")
            .unwrap()
            .unwrap();
        assert!(updated.contains(r#"<PackageVersion Include="CivilGeo.Hydraulics" Version="4.1.0" />"#));
    }

    #[test]
    fn escapes_written_values_and_unescapes_read_values() {
        let content = r#"<Project><ItemGroup><PackageReference Include="CivilGeo.A&amp;B" Version="1.0.0" /></ItemGroup></Project>"#;
        let found = locate_declarations(content).unwrap();
        assert_eq!(found[0].declaration.name, "CivilGeo.A&B");

        let updated = replace_declared_version(content, "CivilGeo.A&B", "1.0.0-x&y")
            .unwrap()
            .unwrap();
        assert!(updated.contains(r#"Version="1.0.0-x&amp;y""#));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        let content = "<Project><ItemGroup></Project>";
        let err = locate_declarations(content).unwrap_err();
        assert!(err.contains("XML parsing error"));
    }

    #[test]
    fn preserves_byte_order_mark() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Bom.csproj");
        let content = format!("\u{feff}{PROJECT}");
        fs::write(&path, &content).unwrap();

        ProjectFileStore::write_declared_version(&path, "CivilGeo.Core", "1.0.1").unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with('\u{feff}'));
        assert_eq!(written.len(), content.len());
        assert!(written.contains(r#"Include="CivilGeo.Core" Version="1.0.1""#));
    }

    #[test]
    fn missing_declaration_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("App.csproj");
        fs::write(&path, PROJECT).unwrap();

        let err = ProjectFileStore::read_declared_version(&path, "CivilGeo.Missing").unwrap_err();
        assert!(matches!(err, NupdError::DeclarationNotFound { package, .. } if package == "CivilGeo.Missing"));
    }

    #[test]
    fn writing_absent_declaration_is_a_no_op() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("App.csproj");
        fs::write(&path, PROJECT).unwrap();

        assert!(!ProjectFileStore::write_declared_version(&path, "CivilGeo.Missing", "1.0.0").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), PROJECT);
    }
}
