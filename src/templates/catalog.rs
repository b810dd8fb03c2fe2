use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Medical,
    Educational,
    Interactive,
    General,
    Clinical,
}

impl Category {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "medical" => Some(Category::Medical),
            "educational" => Some(Category::Educational),
            "interactive" => Some(Category::Interactive),
            "general" => Some(Category::General),
            "clinical" => Some(Category::Clinical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemplateProp {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub example: &'static str,
}

/// A ready-to-insert MDX component snippet and the keywords that suggest it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SmartTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub keywords: &'static [&'static str],
    pub template: &'static str,
    pub category: Category,
    pub props: &'static [TemplateProp],
}

const fn prop(
    name: &'static str,
    kind: &'static str,
    description: &'static str,
    required: bool,
    example: &'static str,
) -> TemplateProp {
    TemplateProp {
        name,
        kind,
        description,
        required,
        example,
    }
}

const ALERT_TYPES: &str = r#""info" | "warning" | "error" | "emergency" | "tip" | "clinical-note""#;
const CALCULATOR_TYPES: &str = r#""bmi" | "fluoride" | "dmft" | "anesthetic""#;

const CALCULATOR_PROPS: &[TemplateProp] = &[
    prop("type", CALCULATOR_TYPES, "Type of calculator to display", true, r#""bmi""#),
    prop("title", "string", "Calculator title", false, r#""BMI Calculator""#),
];

// Declaration order is the tie-break order for suggestions
pub static CATALOG: &[SmartTemplate] = &[
    SmartTemplate {
        id: "tooth-diagram",
        name: "Tooth Diagram",
        description: "Interactive tooth diagram showing dental conditions",
        keywords: &["tooth", "teeth", "diagram", "dental", "visualization"],
        template: r#"<ToothDiagram
  teeth={[
    { number: 8, status: 'healthy', label: 'Central Incisor' },
    { number: 9, status: 'cavity', label: 'Lateral Incisor' },
    { number: 10, status: 'filled', label: 'Canine' },
    { number: 11, status: 'crown', label: 'First Premolar' }
  ]}
  interactive={true}
/>"#,
        category: Category::Clinical,
        props: &[
            prop(
                "teeth",
                "Array<{number: number, status: string, label: string}>",
                "Array of tooth objects with number, status, and label",
                true,
                r#"[{number: 8, status: "healthy", label: "Central Incisor"}]"#,
            ),
            prop("interactive", "boolean", "Enable click interactions on teeth", false, "true"),
        ],
    },
    SmartTemplate {
        id: "emergency-alert",
        name: "Emergency Warning",
        description: "For urgent medical situations",
        keywords: &["emergency", "urgent", "immediate", "danger", "warning", "seek help"],
        template: r#"<Alert type="emergency">
  <strong>Dental Emergency</strong>
  If you're experiencing severe pain, facial swelling, or uncontrolled bleeding, seek immediate medical attention.
</Alert>"#,
        category: Category::Medical,
        props: &[
            prop("type", ALERT_TYPES, "Alert type determines styling and icon", true, r#""emergency""#),
            prop(
                "children",
                "ReactNode",
                "Content to display inside the alert",
                true,
                "<strong>Alert Title</strong>\nAlert message content",
            ),
        ],
    },
    SmartTemplate {
        id: "symptom-assessment",
        name: "Symptom Assessment",
        description: "Help patients evaluate their symptoms",
        keywords: &["pain", "symptom", "assessment", "rate", "severity", "discomfort"],
        template: r#"<SymptomSeverityScale
  title="Rate Your Current Symptoms"
  description="Use this scale to help your dentist understand your pain level"
  showGuide={true}
/>"#,
        category: Category::Medical,
        props: &[
            prop("title", "string", "Title displayed above the severity scale", false, r#""Rate Your Current Symptoms""#),
            prop("description", "string", "Helper text explaining the scale", false, r#""Use this scale to help your dentist understand your pain level""#),
            prop("showGuide", "boolean", "Show guide explaining each pain level", false, "true"),
        ],
    },
    SmartTemplate {
        id: "treatment-options",
        name: "Treatment Comparison",
        description: "Compare different treatment approaches",
        keywords: &["treatment", "options", "comparison", "alternatives", "choices", "procedures"],
        template: r#"<TreatmentComparisonTable
  title="Treatment Options for [Condition]"
  description="Compare the available treatments to make an informed decision"
  treatments={[
    {
      name: "Conservative Treatment",
      duration: "1 visit",
      cost: "£50-150",
      successRate: "85%",
      nhsAvailable: true,
      pros: ["Less invasive", "Lower cost", "Quick recovery"],
      cons: ["May not be permanent", "Limited to minor issues"],
      painLevel: "low",
      recoveryTime: "1-2 days"
    },
    {
      name: "Advanced Treatment",
      duration: "2-3 visits",
      cost: "£300-600",
      successRate: "95%",
      nhsAvailable: false,
      pros: ["Long-lasting results", "Addresses root cause", "Better aesthetics"],
      cons: ["Higher cost", "More time required", "Longer recovery"],
      painLevel: "medium",
      recoveryTime: "1 week"
    }
  ]}
/>"#,
        category: Category::Medical,
        props: &[
            prop("title", "string", "Title of the comparison table", false, r#""Treatment Options for Root Canal""#),
            prop("description", "string", "Description text below the title", false, r#""Compare the available treatments""#),
            prop(
                "treatments",
                "Array<Treatment>",
                "Array of treatment objects with name, duration, cost, successRate, nhsAvailable, pros, cons, painLevel, recoveryTime",
                true,
                r#"[{name: "Option 1", duration: "1 visit", cost: "£100", ...}]"#,
            ),
        ],
    },
    SmartTemplate {
        id: "procedure-timeline",
        name: "Treatment Timeline",
        description: "Show the stages of a dental procedure",
        keywords: &["procedure", "timeline", "stages", "steps", "process", "journey"],
        template: r#"<Timeline>
  <TimelineItem date="Consultation" title="Initial Assessment">
    Examination and diagnosis of your condition
  </TimelineItem>
  <TimelineItem date="Week 1" title="Treatment Planning">
    Develop a personalized treatment plan
  </TimelineItem>
  <TimelineItem date="Week 2-3" title="Active Treatment">
    Perform the necessary procedures
  </TimelineItem>
  <TimelineItem date="Week 4+" title="Follow-up Care">
    Monitor healing and ensure success
  </TimelineItem>
</Timeline>"#,
        category: Category::Educational,
        props: &[prop(
            "children",
            "ReactNode (TimelineItem components)",
            "TimelineItem components to display in sequence",
            true,
            r#"<TimelineItem date="Day 1" title="Step 1">Description</TimelineItem>"#,
        )],
    },
    SmartTemplate {
        id: "cost-breakdown",
        name: "Cost Breakdown Table",
        description: "Detailed cost information for treatments",
        keywords: &["cost", "price", "fee", "payment", "nhs", "private", "expense"],
        template: r#"<CostTable costs={[
  { item: "Initial Consultation", cost: "£50-80", nhs: true },
  { item: "Diagnostic X-rays", cost: "£25-50", nhs: true },
  { item: "Basic Treatment", cost: "£65.20", nhs: true },
  { item: "Advanced Treatment", cost: "£282.80", nhs: true },
  { item: "Private Alternative", cost: "£300-500", nhs: false }
]} />"#,
        category: Category::General,
        props: &[prop(
            "costs",
            "Array<{item: string, cost: string, nhs: boolean}>",
            "Array of cost items with item name, cost range, and NHS availability",
            true,
            r#"[{item: "Consultation", cost: "£50-80", nhs: true}]"#,
        )],
    },
    SmartTemplate {
        id: "procedure-steps",
        name: "Step-by-Step Guide",
        description: "Explain a procedure in simple steps",
        keywords: &["how", "steps", "guide", "instructions", "procedure", "process"],
        template: r#"<ProcedureSteps>
  <li>Initial preparation and local anaesthetic</li>
  <li>Removal of decay or damaged tissue</li>
  <li>Cleaning and shaping the area</li>
  <li>Placement of filling or restoration</li>
  <li>Final adjustments and polishing</li>
</ProcedureSteps>"#,
        category: Category::Educational,
        props: &[prop(
            "children",
            "ReactNode (li elements)",
            "List items (<li>) containing procedure steps",
            true,
            "<li>Step 1: Prepare the area</li>",
        )],
    },
    SmartTemplate {
        id: "clinical-note",
        name: "Clinical Information",
        description: "Professional guidance or technical details",
        keywords: &["clinical", "professional", "technical", "medical", "scientific"],
        template: r#"<Alert type="clinical-note">
  <strong>Clinical Note:</strong> This information is based on current clinical guidelines and evidence-based practice.
</Alert>"#,
        category: Category::Medical,
        props: &[
            prop("type", ALERT_TYPES, "Alert type determines styling and icon", true, r#""clinical-note""#),
            prop(
                "children",
                "ReactNode",
                "Content to display inside the alert",
                true,
                "<strong>Note:</strong> Clinical information here",
            ),
        ],
    },
    SmartTemplate {
        id: "prevention-tips",
        name: "Prevention Tips",
        description: "Advice for preventing dental problems",
        keywords: &["prevent", "avoid", "tips", "advice", "maintenance", "care"],
        template: r#"<Alert type="tip">
  <strong>Prevention Tips:</strong>
  <ul>
    <li>Brush twice daily with fluoride toothpaste</li>
    <li>Floss daily to remove plaque between teeth</li>
    <li>Visit your dentist regularly for check-ups</li>
    <li>Limit sugary foods and drinks</li>
  </ul>
</Alert>"#,
        category: Category::Educational,
        props: &[
            prop("type", ALERT_TYPES, "Alert type determines styling and icon", true, r#""tip""#),
            prop(
                "children",
                "ReactNode",
                "Content to display inside the alert",
                true,
                "<strong>Tips:</strong><ul><li>Tip 1</li></ul>",
            ),
        ],
    },
    SmartTemplate {
        id: "dental-chart",
        name: "Interactive Dental Chart",
        description: "Visual representation of dental conditions",
        keywords: &["tooth", "teeth", "chart", "diagram", "visual", "map"],
        template: r#"<InteractiveToothChart
  title="Dental Examination Results"
  description="Click on any tooth to see details"
  teeth={[
    { id: 16, condition: "healthy", notes: "No issues detected" },
    { id: 14, condition: "filling", notes: "Composite filling placed 2023" },
    { id: 27, condition: "cavity", notes: "Small cavity requiring treatment" }
  ]}
  showLegend={true}
/>"#,
        category: Category::Interactive,
        props: &[
            prop("title", "string", "Chart title", false, r#""Dental Examination Results""#),
            prop("description", "string", "Helper text below title", false, r#""Click on any tooth to see details""#),
            prop(
                "teeth",
                "Array<{id: number, condition: string, notes: string}>",
                "Array of tooth data with id, condition, and notes",
                false,
                r#"[{id: 16, condition: "healthy", notes: "No issues"}]"#,
            ),
            prop("showLegend", "boolean", "Show condition color legend", false, "true"),
            prop("onToothClick", "function", "Callback when a tooth is clicked", false, "(toothId) => console.log(toothId)"),
        ],
    },
    SmartTemplate {
        id: "faq-section",
        name: "Frequently Asked Questions",
        description: "Common questions and answers",
        keywords: &["faq", "question", "answer", "common", "frequently", "asked"],
        template: r#"<FAQ question="How long will the treatment take?">
  Treatment duration varies depending on the complexity, but typically takes 30-60 minutes per appointment.
</FAQ>

<FAQ question="Will it hurt?">
  Modern dental techniques and anaesthetics ensure minimal discomfort. Most patients experience little to no pain during treatment.
</FAQ>

<FAQ question="What are the aftercare instructions?">
  Avoid eating for 2 hours after treatment, maintain good oral hygiene, and follow any specific instructions from your dentist.
</FAQ>"#,
        category: Category::Educational,
        props: &[
            prop("question", "string", "The question being asked", true, r#""How long will it take?""#),
            prop("children", "ReactNode", "The answer content", true, "The treatment typically takes 30-60 minutes."),
        ],
    },
    SmartTemplate {
        id: "smart-faq",
        name: "Smart FAQ Accordion",
        description: "Categorized FAQs with collapsible sections",
        keywords: &["faq", "accordion", "categorized", "smart", "organized"],
        template: r#"<SmartFAQ
  faqs={[
    {
      question: "What is the cost of treatment?",
      answer: "Treatment costs vary depending on the procedure. NHS Band 1 covers examinations (£25.80), Band 2 covers fillings and extractions (£70.70), and Band 3 covers crowns and dentures (£306.80).",
      category: "cost"
    },
    {
      question: "How often should I visit the dentist?",
      answer: "Most people should visit their dentist every 6-12 months for check-ups. Your dentist will advise on the best frequency based on your oral health.",
      category: "general"
    },
    {
      question: "What should I do in a dental emergency?",
      answer: "For severe pain, swelling, or trauma, contact your dentist immediately or call NHS 111. For life-threatening emergencies, go to A&E.",
      category: "emergency"
    }
  ]}
/>"#,
        category: Category::Educational,
        props: &[prop(
            "faqs",
            "Array<{question: string, answer: string, category: string}>",
            "Array of FAQ objects with question, answer, and category",
            true,
            r#"[{question: "How much?", answer: "£50", category: "cost"}]"#,
        )],
    },
    SmartTemplate {
        id: "branching-timeline",
        name: "Branching Timeline",
        description: "Show treatment stages with decision points",
        keywords: &["timeline", "process", "stages", "workflow", "branching", "decision"],
        template: r#"<BranchingTimeline
  stages={[
    {
      title: "Initial Consultation",
      description: "Comprehensive oral examination and X-rays",
      options: ["Proceed with treatment", "Seek second opinion", "Delay treatment"]
    },
    {
      title: "Treatment Planning",
      description: "Discuss treatment options and create personalized plan",
      options: ["Conservative approach", "Comprehensive treatment"]
    },
    {
      title: "Active Treatment",
      description: "Implementation of agreed treatment plan"
    },
    {
      title: "Follow-up Care",
      description: "Regular check-ups and maintenance"
    }
  ]}
/>"#,
        category: Category::Interactive,
        props: &[prop(
            "stages",
            "Array<{title: string, description: string, options?: string[]}>",
            "Array of timeline stages with title, description, and optional branching options",
            true,
            r#"[{title: "Step 1", description: "First step", options: ["Option A", "Option B"]}]"#,
        )],
    },
    SmartTemplate {
        id: "medication-card",
        name: "Medication Card",
        description: "Display medication information clearly",
        keywords: &["medication", "prescription", "drug", "medicine", "dosage"],
        template: r#"<MedicationCard
  name="Amoxicillin"
  dosage="500mg"
  frequency="Three times daily"
  duration="7 days"
  instructions="Take with or after food. Complete the full course even if symptoms improve."
/>"#,
        category: Category::Medical,
        props: &[
            prop("name", "string", "Medication name", true, r#""Amoxicillin""#),
            prop("dosage", "string", "Dosage amount", true, r#""500mg""#),
            prop("frequency", "string", "How often to take", true, r#""Three times daily""#),
            prop("duration", "string", "Treatment duration", true, r#""7 days""#),
            prop("instructions", "string", "Additional instructions", false, r#""Take with food""#),
        ],
    },
    SmartTemplate {
        id: "enhanced-cost-table",
        name: "Enhanced Cost Table",
        description: "Display treatment costs with calculator",
        keywords: &["cost", "price", "fee", "charge", "payment", "nhs", "private"],
        template: r#"<EnhancedCostTable
  title="Treatment Cost Breakdown"
  items={[
    { item: "Initial Consultation", cost: "£50-80", nhs: true },
    { item: "X-rays (if required)", cost: "£30-60", nhs: true },
    { item: "Simple Filling", cost: "£70-150", nhs: true },
    { item: "Root Canal Treatment", cost: "£300-600", nhs: false },
    { item: "Crown", cost: "£400-800", nhs: false }
  ]}
  showCalculator={true}
/>"#,
        category: Category::General,
        props: &[
            prop("title", "string", "Table title", false, r#""Treatment Cost Breakdown""#),
            prop(
                "items",
                "Array<{item: string, cost: string, nhs: boolean}>",
                "Array of cost items",
                true,
                r#"[{item: "Filling", cost: "£100", nhs: true}]"#,
            ),
            prop("showCalculator", "boolean", "Show cost calculator below table", false, "true"),
        ],
    },
    SmartTemplate {
        id: "bmi-calculator",
        name: "BMI Calculator",
        description: "Body Mass Index calculator",
        keywords: &["bmi", "calculator", "weight", "height", "obesity"],
        template: r#"<ClinicalCalculator type="bmi" title="BMI Calculator" />"#,
        category: Category::Clinical,
        props: CALCULATOR_PROPS,
    },
    SmartTemplate {
        id: "fluoride-calculator",
        name: "Fluoride Dosage Calculator",
        description: "Calculate recommended fluoride dosage by age",
        keywords: &["fluoride", "dosage", "calculator", "pediatric"],
        template: r#"<ClinicalCalculator type="fluoride" title="Fluoride Dosage Calculator" />"#,
        category: Category::Clinical,
        props: CALCULATOR_PROPS,
    },
    SmartTemplate {
        id: "dmft-calculator",
        name: "DMFT Score Calculator",
        description: "Calculate Decayed, Missing, Filled Teeth score",
        keywords: &["dmft", "score", "caries", "risk", "assessment"],
        template: r#"<ClinicalCalculator type="dmft" title="DMFT Score Calculator" />"#,
        category: Category::Clinical,
        props: CALCULATOR_PROPS,
    },
    SmartTemplate {
        id: "anesthetic-calculator",
        name: "Local Anesthetic Dosage",
        description: "Calculate safe anesthetic dosage",
        keywords: &["anesthetic", "lidocaine", "dosage", "calculator"],
        template: r#"<ClinicalCalculator type="anesthetic" title="Local Anesthetic Dosage Calculator" />"#,
        category: Category::Clinical,
        props: CALCULATOR_PROPS,
    },
];

pub fn find(id: &str) -> Option<&'static SmartTemplate> {
    CATALOG.iter().find(|t| t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_keywords_lowercase() {
        let ids: HashSet<_> = CATALOG.iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), CATALOG.len());
        for template in CATALOG {
            assert!(!template.keywords.is_empty(), "{} has no keywords", template.id);
            assert!(template.keywords.iter().all(|k| *k == k.to_lowercase()));
        }
    }

    #[test]
    fn find_and_parse_category() {
        assert_eq!(find("medication-card").map(|t| t.category), Some(Category::Medical));
        assert!(find("nope").is_none());
        assert_eq!(Category::parse(" Clinical "), Some(Category::Clinical));
        assert_eq!(Category::parse("unknown"), None);
    }
}
