// Copyright 2025 Webmobix Solutions AG
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUTHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Turns one rendered result page into a [`StudentRecord`].
//!
//! The result site renders everything into nested tables without ids or
//! classes on the interesting parts, so the lookups below are structural:
//!
//! * the student info table sits under `div#exam_result`, one `th`/`td` pair per row;
//! * the summary block is the `div` styled `text-align: center` holding GPA, CGPA
//!   and the retake course codes;
//! * the grades table is the `width="100%"` table nested inside a header cell.

use crate::results::record::{CourseGrade, StudentRecord};
use scraper::{ElementRef, Html};
use tracing::debug;

const NAME_LABEL: &str = "Student's Name";
const REGISTRATION_LABEL: &str = "Registration";
const SUMMARY_STYLE_MARKER: &str = "text-align: center";
const GRADE_ROW_CELLS: usize = 5;

/// Parses raw HTML and extracts the student record.
pub fn extract(html: &str) -> StudentRecord {
    extract_document(&Html::parse_document(html))
}

/// Extracts the student record from an already parsed document.
///
/// Missing parts of the page never fail the extraction; the affected fields
/// keep their defaults.
pub fn extract_document(document: &Html) -> StudentRecord {
    let mut record = StudentRecord::default();

    read_info_table(document, &mut record);

    match find_summary(document) {
        Some(summary) => {
            record.summary_found = true;
            read_summary(summary, &mut record);
            record.courses = read_grades_table(document);
        }
        None => debug!("📄 No result summary on page, leaving GPA/CGPA/courses empty"),
    }

    record
}

fn read_info_table(document: &Html, record: &mut StudentRecord) {
    let rows = document.select(selector!(
        "div#exam_result > div.row > div.col-12 > table.table-bordered > tbody > tr"
    ));

    for row in rows {
        let mut headers = row.select(selector!("th"));
        let (Some(header), None) = (headers.next(), headers.next()) else {
            continue;
        };

        let Some(cell) = row.select(selector!("td")).next() else {
            continue;
        };

        let label = stripped_text(header);
        if label.contains(NAME_LABEL) {
            record.name = Some(stripped_text(cell));
        } else if label.contains(REGISTRATION_LABEL) {
            record.registration = Some(stripped_text(cell));
        }
    }
}

fn find_summary(document: &Html) -> Option<ElementRef<'_>> {
    document.select(selector!("div[style]")).find(|div| {
        div.value()
            .attr("style")
            .is_some_and(|style| style.contains(SUMMARY_STYLE_MARKER))
    })
}

fn read_summary(summary: ElementRef<'_>, record: &mut StudentRecord) {
    let text = summary
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if let Some(gpa) = regex!(r"\bGPA:\s*([\d.]+)").captures(&text) {
        record.gpa = gpa[1].to_string();
    }
    if let Some(cgpa) = regex!(r"CGPA:\s*([\d.]+)").captures(&text) {
        record.cgpa = cgpa[1].to_string();
    }

    let comma_joined = summary.text().collect::<Vec<_>>().join(",");
    record.fail_subjects = regex!(r"[A-Z]{2,}-\d{4}")
        .find_iter(&comma_joined)
        .map(|code| code.as_str().to_string())
        .collect();
}

fn read_grades_table(document: &Html) -> Vec<CourseGrade> {
    let Some(table) = document.select(selector!(r#"th table[width="100%"]"#)).next() else {
        debug!("📄 Grades table not found on page");
        return Vec::new();
    };

    table
        .select(selector!("tr"))
        .skip(1)
        .filter_map(|row| {
            let cells: Vec<_> = row.select(selector!("td")).collect();
            if cells.len() != GRADE_ROW_CELLS {
                return None;
            }
            Some(CourseGrade::new(stripped_text(cells[2]), stripped_text(cells[4])))
        })
        .collect()
}

/// Concatenates the element's text nodes, each trimmed, blank ones dropped.
fn stripped_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct PageBuilder {
        pub name: Option<&'static str>,
        pub registration: Option<&'static str>,
        pub summary: Option<String>,
        pub grade_rows: Vec<String>,
    }

    impl PageBuilder {
        pub(crate) fn new() -> Self {
            Self {
                name: Some("Jane Doe"),
                registration: Some("745"),
                summary: Some(
                    "<small>GPA: 3.75</small><br><small>CGPA: 3.50</small>".to_string(),
                ),
                grade_rows: vec![grade_row("CSE-1205", "Data Structures", "3.67")],
            }
        }

        pub(crate) fn render(&self) -> String {
            let mut info_rows = String::new();
            if let Some(name) = self.name {
                info_rows.push_str(&format!("<tr><th>Student's Name</th><td> {name} </td></tr>"));
            }
            info_rows.push_str("<tr><th>Program</th><th>Session</th><td>ignored</td></tr>");
            if let Some(reg) = self.registration {
                info_rows.push_str(&format!("<tr><th>Registration No.</th><td>\n  {reg}\n</td></tr>"));
            }

            let grades = format!(
                "<tr><th colspan=\"2\"><table width=\"100%\">\
                 <tr><td>SL</td><td>Code</td><td>Course Title</td><td>Credit</td><td>Grade Point</td></tr>\
                 {}\
                 </table></th></tr>",
                self.grade_rows.join("")
            );

            let summary = self
                .summary
                .as_ref()
                .map(|inner| {
                    format!(
                        "<tr><td colspan=\"2\"><div style=\"text-align: center; font-weight: bold\">{inner}</div></td></tr>"
                    )
                })
                .unwrap_or_default();

            format!(
                "<html><head><title>DUCMC</title></head><body>\
                 <h3>Examination Result</h3>\
                 <div id=\"exam_result\"><div class=\"row\"><div class=\"col-12\">\
                 <table class=\"table table-bordered\"><tbody>{info_rows}{grades}{summary}</tbody></table>\
                 </div></div></div></body></html>"
            )
        }
    }

    pub(crate) fn grade_row(code: &str, title: &str, grade: &str) -> String {
        format!(
            "<tr><td>1</td><td>{code}</td><td> {title} </td><td>3.0</td><td>{grade}</td></tr>"
        )
    }

    #[test]
    fn extracts_full_result_page() {
        let record = extract(&PageBuilder::new().render());

        assert_eq!(record.name.as_deref(), Some("Jane Doe"));
        assert_eq!(record.registration.as_deref(), Some("745"));
        assert_eq!(record.gpa, "3.75");
        assert_eq!(record.cgpa, "3.50");
        assert!(record.fail_subjects.is_empty());
        assert!(record.summary_found);
        assert_eq!(record.courses, vec![CourseGrade::new("Data Structures", "3.67")]);
    }

    #[test]
    fn missing_summary_leaves_result_fields_empty() {
        let mut page = PageBuilder::new();
        page.summary = None;

        let record = extract(&page.render());

        assert_eq!(record.registration.as_deref(), Some("745"));
        assert_eq!(record.gpa, "");
        assert_eq!(record.cgpa, "");
        assert_eq!(record.fail_subjects_joined(), "");
        assert!(record.courses.is_empty());
        assert!(!record.summary_found);
    }

    #[test]
    fn missing_info_rows_leave_fields_absent() {
        let mut page = PageBuilder::new();
        page.name = None;
        page.registration = None;

        let record = extract(&page.render());

        assert_eq!(record.name, None);
        assert_eq!(record.registration, None);
        assert!(!record.is_usable());
        assert_eq!(record.gpa, "3.75");
    }

    #[test]
    fn cgpa_listed_first_does_not_leak_into_gpa() {
        let mut page = PageBuilder::new();
        page.summary = Some("<p>CGPA: 3.10</p><p>GPA: 2.90</p>".to_string());

        let record = extract(&page.render());

        assert_eq!(record.gpa, "2.90");
        assert_eq!(record.cgpa, "3.10");
    }

    #[test]
    fn prefixed_gpa_labels_are_not_read_as_gpa() {
        let mut page = PageBuilder::new();
        page.summary = Some("<p>SGPA: 3.40</p><p>CGPA: 3.20</p>".to_string());

        let record = extract(&page.render());

        assert_eq!(record.gpa, "");
        assert_eq!(record.cgpa, "3.20");
    }

    #[test]
    fn summary_without_numbers_keeps_empty_strings() {
        let mut page = PageBuilder::new();
        page.summary = Some("<b>Absent</b>".to_string());

        let record = extract(&page.render());

        assert!(record.summary_found);
        assert_eq!(record.gpa, "");
        assert_eq!(record.cgpa, "");
    }

    #[test]
    fn collects_retake_codes_in_order_with_duplicates() {
        let mut page = PageBuilder::new();
        page.summary = Some(
            "<small>GPA: 2.10</small><br><small>CGPA: 2.80</small><br>\
             <small>Retake: CSE-1101, EEE-1102</small><span>CSE-1101</span><span>cse-9999 X-1234</span>"
                .to_string(),
        );

        let record = extract(&page.render());

        assert_eq!(record.fail_subjects, vec!["CSE-1101", "EEE-1102", "CSE-1101"]);
        assert_eq!(record.fail_subjects_joined(), "CSE-1101, EEE-1102, CSE-1101");
    }

    #[test]
    fn grade_rows_with_other_cell_counts_are_skipped() {
        let mut page = PageBuilder::new();
        page.grade_rows = vec![
            grade_row("CSE-1205", "Data Structures", "3.67"),
            "<tr><td colspan=\"5\">Theory Courses</td></tr>".to_string(),
            "<tr><td>2</td><td>MATH-1201</td><td>Calculus</td><td>3.0</td></tr>".to_string(),
            "<tr><td>3</td><td>X</td><td>Y</td><td>1</td><td>A</td><td>extra</td></tr>".to_string(),
            grade_row("EEE-1102", "Electrical Circuits", ""),
        ];

        let record = extract(&page.render());

        assert_eq!(
            record.courses,
            vec![
                CourseGrade::new("Data Structures", "3.67"),
                CourseGrade::new("Electrical Circuits", "0.00"),
            ]
        );
    }

    #[test]
    fn first_grades_row_is_treated_as_header() {
        let mut page = PageBuilder::new();
        page.grade_rows = vec![];

        let record = extract(&page.render());

        assert!(record.courses.is_empty());
    }

    #[test]
    fn empty_document_yields_default_record() {
        assert_eq!(extract(""), StudentRecord::default());
        assert_eq!(extract("<html><body><p>No result found</p></body></html>"), StudentRecord::default());
    }
}
