//! Carriers shipped with the crate.

use super::definition::{CarrierDefinition, ElementFamily, Mapping, Platform};
use crate::opc::DocumentKind;
use indexmap::IndexMap;

/// Text styles in a presentation slide master.
const TITLE_STYLE: &str = "/p:sldMaster/p:txStyles/p:titleStyle/a:lvl1pPr/a:defRPr";
const BODY_STYLE: &str = "/p:sldMaster/p:txStyles/p:bodyStyle/a:lvl1pPr/a:defRPr";

fn carrier(
    id: &str,
    family: ElementFamily,
    document: DocumentKind,
    part: &str,
    description: &str,
    bases: &[&str],
    mappings: &[(&str, &str)],
) -> CarrierDefinition {
    // All three suites read the same OOXML, so each platform starts from the
    // same templates.
    let templates = Platform::ALL
        .iter()
        .map(|p| (*p, bases.iter().map(|b| b.to_string()).collect()))
        .collect::<IndexMap<_, _>>();
    CarrierDefinition {
        id: id.to_string(),
        family,
        document,
        part: part.to_string(),
        description: Some(description.to_string()),
        namespaces: IndexMap::new(),
        templates,
        mappings: mappings.iter().map(|(t, x)| Mapping::new(*t, *x)).collect(),
        background: None,
    }
}

pub(crate) fn builtin_carriers() -> Vec<CarrierDefinition> {
    let mut title = carrier(
        "pptx.title",
        ElementFamily::Title,
        DocumentKind::Presentation,
        "ppt/slideMasters/slideMaster*.xml",
        "Title placeholder text style of each slide master",
        &[TITLE_STYLE],
        &[
            ("typography.title.size", "@sz"),
            ("color.title", "a:solidFill/a:srgbClr/@val"),
            ("font.heading", "a:latin/@typeface"),
        ],
    );
    title.background = Some("color.background".to_string());

    let mut body = carrier(
        "pptx.body",
        ElementFamily::Body,
        DocumentKind::Presentation,
        "ppt/slideMasters/slideMaster*.xml",
        "Body placeholder text style of each slide master",
        &[BODY_STYLE],
        &[
            ("typography.body.size", "@sz"),
            ("color.text", "a:solidFill/a:srgbClr/@val"),
            ("font.body", "a:latin/@typeface"),
        ],
    );
    body.background = Some("color.background".to_string());

    let mut docx = carrier(
        "docx.defaults",
        ElementFamily::DocumentDefaults,
        DocumentKind::Document,
        "word/styles.xml",
        "Default run properties of a word-processing document",
        &["/w:styles/w:docDefaults/w:rPrDefault/w:rPr"],
        &[
            ("typography.body.size", "w:sz/@w:val"),
            ("typography.body.size", "w:szCs/@w:val"),
            ("font.body", "w:rFonts/@w:ascii"),
            ("font.body", "w:rFonts/@w:hAnsi"),
            ("color.text", "w:color/@w:val"),
        ],
    );
    docx.background = Some("color.background".to_string());

    vec![
        carrier(
            "pptx.theme.colors",
            ElementFamily::Theme,
            DocumentKind::Presentation,
            "ppt/theme/theme*.xml",
            "Theme color scheme",
            &["/a:theme/a:themeElements/a:clrScheme"],
            &[
                ("color.dark1", "a:dk1/a:srgbClr/@val"),
                ("color.light1", "a:lt1/a:srgbClr/@val"),
                ("color.dark2", "a:dk2/a:srgbClr/@val"),
                ("color.light2", "a:lt2/a:srgbClr/@val"),
                ("color.accent1", "a:accent1/a:srgbClr/@val"),
                ("color.accent2", "a:accent2/a:srgbClr/@val"),
                ("color.accent3", "a:accent3/a:srgbClr/@val"),
                ("color.accent4", "a:accent4/a:srgbClr/@val"),
                ("color.accent5", "a:accent5/a:srgbClr/@val"),
                ("color.accent6", "a:accent6/a:srgbClr/@val"),
                ("color.hyperlink", "a:hlink/a:srgbClr/@val"),
                ("color.hyperlinkVisited", "a:folHlink/a:srgbClr/@val"),
            ],
        ),
        carrier(
            "pptx.theme.fonts",
            ElementFamily::Theme,
            DocumentKind::Presentation,
            "ppt/theme/theme*.xml",
            "Theme font scheme",
            &["/a:theme/a:themeElements/a:fontScheme"],
            &[
                ("font.heading", "a:majorFont/a:latin/@typeface"),
                ("font.body", "a:minorFont/a:latin/@typeface"),
            ],
        ),
        title,
        body,
        docx,
        carrier(
            "xlsx.defaults",
            ElementFamily::WorkbookDefaults,
            DocumentKind::Spreadsheet,
            "xl/styles.xml",
            "Default cell font of a workbook",
            &["/x:styleSheet/x:fonts/x:font[1]"],
            &[
                ("typography.body.size", "x:sz/@val"),
                ("font.body", "x:name/@val"),
                ("color.text", "x:color/@rgb"),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_valid() {
        let carriers = builtin_carriers();
        assert_eq!(carriers.len(), 6);
        for def in &carriers {
            def.validate().unwrap();
            for platform in Platform::ALL {
                assert!(def.supports(platform), "{} lacks {}", def.id, platform);
            }
        }
    }
}
